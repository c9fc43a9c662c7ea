use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use csv::StringRecord;

/// Header row served by the template download, and the source of the
/// canonical lowercase field names used for row lookups.
pub const TEMPLATE_HEADERS: [&str; 8] = [
    "Student ID",
    "Student Name",
    "Section",
    "Subject",
    "Midterm Score",
    "Midterm Grade",
    "Final Score",
    "Final Grade",
];

/// Maps canonical lowercase field names to column indexes so that row
/// lookups are case- and whitespace-insensitive. Extra columns are ignored;
/// a duplicated header keeps its first occurrence.
pub struct HeaderMap {
    by_name: HashMap<String, usize>,
}

impl HeaderMap {
    pub fn from_headers(headers: &StringRecord) -> Self {
        let mut by_name = HashMap::new();
        for (idx, raw) in headers.iter().enumerate() {
            let key = raw.trim().to_lowercase();
            by_name.entry(key).or_insert(idx);
        }
        Self { by_name }
    }

    /// Trimmed cell value for a canonical field, or "" when the column is
    /// missing entirely or the record is too short.
    pub fn field<'r>(&self, record: &'r StringRecord, name: &str) -> &'r str {
        self.by_name
            .get(name)
            .and_then(|idx| record.get(*idx))
            .map(str::trim)
            .unwrap_or("")
    }
}

pub fn write_template(path: &Path) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create template {}", path.to_string_lossy()))?;
    wtr.write_record(TEMPLATE_HEADERS)
        .context("failed to write template header row")?;
    wtr.flush().context("failed to flush template")?;
    Ok(())
}
