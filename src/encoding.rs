/// Best-effort decoding for uploaded files. Uploads come from spreadsheet
/// exports on assorted machines, so the bytes may be UTF-8, UTF-16 with a
/// BOM, or a single-byte Windows codepage. Decoding never fails: bad
/// sequences become U+FFFD and the caller keeps going.
pub struct Decoded {
    pub encoding: &'static str,
    pub text: String,
}

// Windows-1252 codepoints for 0x80..=0x9F. Zero marks the five slots the
// codepage leaves undefined; those decode to U+FFFD.
const CP1252_HIGH: [u32; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
    0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

pub fn decode_lossy(bytes: &[u8]) -> Decoded {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Decoded {
            encoding: "utf-8",
            text: String::from_utf8_lossy(&bytes[3..]).into_owned(),
        };
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Decoded {
            encoding: "utf-16le",
            text: decode_utf16(&bytes[2..], u16::from_le_bytes),
        };
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Decoded {
            encoding: "utf-16be",
            text: decode_utf16(&bytes[2..], u16::from_be_bytes),
        };
    }
    if std::str::from_utf8(bytes).is_ok() {
        return Decoded {
            encoding: "utf-8",
            text: String::from_utf8_lossy(bytes).into_owned(),
        };
    }
    Decoded {
        encoding: "windows-1252",
        text: decode_windows_1252(bytes),
    }
}

fn decode_utf16(bytes: &[u8], make: fn([u8; 2]) -> u16) -> String {
    let mut units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| make([c[0], c[1]]))
        .collect();
    if bytes.len() % 2 != 0 {
        // Odd trailing byte cannot form a unit; surface it as a replacement.
        units.push(0xFFFD);
    }
    String::from_utf16_lossy(&units)
}

fn decode_windows_1252(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        let ch = match b {
            0x00..=0x7F => b as char,
            0x80..=0x9F => match CP1252_HIGH[(b - 0x80) as usize] {
                0 => '\u{FFFD}',
                cp => char::from_u32(cp).unwrap_or('\u{FFFD}'),
            },
            // 0xA0..=0xFF map straight to the same Unicode codepoints.
            _ => b as char,
        };
        out.push(ch);
    }
    out
}
