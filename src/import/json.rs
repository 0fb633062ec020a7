use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::Result;
use crate::import::{extension, ImportFormat};
use crate::models::History;

/// JSON importer for an array of daily records
pub struct JsonImporter;

impl JsonImporter {
    pub fn new() -> Self {
        Self
    }

    pub fn read_from<R: std::io::Read>(&self, reader: R) -> Result<History> {
        Ok(serde_json::from_reader(reader)?)
    }
}

impl Default for JsonImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for JsonImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        extension(file_path).as_deref() == Some("json")
    }

    fn import_file(&self, file_path: &Path) -> Result<History> {
        self.read_from(BufReader::new(File::open(file_path)?))
    }

    fn get_format_name(&self) -> &'static str {
        "JSON"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_record_array() {
        let data = r#"[
            {"date": "2024-03-02", "total_steps": 9000, "sleep_duration_minutes": 430, "exercise_minutes": 0, "exercise_done": false},
            {"date": "2024-03-01", "total_steps": 8000, "sleep_duration_minutes": 450, "exercise_minutes": 20.4}
        ]"#;
        let history = JsonImporter::new().read_from(data.as_bytes()).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history.records()[0].exercise_minutes, 20);
        assert!(!history.records()[1].exercise_done);
    }

    #[test]
    fn test_duplicate_dates_rejected() {
        let data = r#"[
            {"date": "2024-03-01", "total_steps": 1, "sleep_duration_minutes": 1, "exercise_minutes": 0},
            {"date": "2024-03-01", "total_steps": 2, "sleep_duration_minutes": 2, "exercise_minutes": 0}
        ]"#;
        assert!(JsonImporter::new().read_from(data.as_bytes()).is_err());
    }
}
