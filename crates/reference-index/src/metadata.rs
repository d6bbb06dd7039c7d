//! Reference metadata records

use glyphcode_common::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::warn;

/// One row of the reference metadata table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub id: String,
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lng", alias = "lon")]
    pub longitude: f64,
}

/// Read every parsable record from a headered CSV file, in file order.
///
/// Malformed rows are logged and skipped; an unreadable file is an error.
pub fn read_records(path: &Path) -> Result<Vec<ReferenceRecord>> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let mut records = Vec::new();
    for (line, row) in reader.deserialize::<ReferenceRecord>().enumerate() {
        match row {
            Ok(record) if record.id.is_empty() => {
                warn!("Reference row {} has an empty id, skipping", line + 2);
            }
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping malformed reference row {}: {}", line + 2, e),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_reads_aliases_and_skips_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.csv");
        fs::write(
            &path,
            "lat, lng, id, title\n\
             1.5, 2.5, a, Fountain\n\
             oops, 2.0, b, Broken\n\
             3.0, 4.0, , Nameless\n\
             5.0, 6.0, c, Statue\n",
        )
        .unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(
            records,
            vec![
                ReferenceRecord {
                    id: "a".to_string(),
                    latitude: 1.5,
                    longitude: 2.5,
                },
                ReferenceRecord {
                    id: "c".to_string(),
                    latitude: 5.0,
                    longitude: 6.0,
                },
            ]
        );
    }

    #[test]
    fn test_full_column_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.csv");
        fs::write(&path, "id,latitude,longitude\nx,-1.25,100\n").unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].latitude, -1.25);
        assert_eq!(records[0].longitude, 100.0);
    }
}
