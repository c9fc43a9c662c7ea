use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Stored format: `sha256$<salt>$<hex digest of salt+plain>`. The scheme tag
/// is kept in the value so the format can be migrated later without a
/// schema change.
pub fn hash_password(plain: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("sha256${}${}", salt, digest_hex(&salt, plain))
}

pub fn verify_password(stored: &str, candidate: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(scheme), Some(salt), Some(digest)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != "sha256" {
        return false;
    }
    digest_hex(salt, candidate) == digest
}

fn digest_hex(salt: &str, plain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(plain.as_bytes());
    let out = hasher.finalize();
    let mut hex = String::with_capacity(out.len() * 2);
    for b in out {
        hex.push_str(&format!("{:02x}", b));
    }
    hex
}
