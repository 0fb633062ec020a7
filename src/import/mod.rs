use std::path::Path;

use tracing::{debug, info};

use crate::error::{HabitError, Result};
use crate::models::History;

pub mod csv;
pub mod json;

/// Trait for reading a daily history from different file formats
pub trait ImportFormat {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Read every record in the file
    fn import_file(&self, file_path: &Path) -> Result<History>;

    /// Get the format name for this importer
    fn get_format_name(&self) -> &'static str;
}

/// Lower-cased file extension, if any
pub(crate) fn extension(file_path: &Path) -> Option<String> {
    file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Picks an importer by file extension
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportManager {
    pub fn new() -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![
            Box::new(csv::CsvImporter::new()),
            Box::new(json::JsonImporter::new()),
        ];

        Self { importers }
    }

    /// Import a single file, auto-detecting the format
    pub fn import_file(&self, file_path: &Path) -> Result<History> {
        let importer = self
            .importers
            .iter()
            .find(|importer| importer.can_import(file_path))
            .ok_or_else(|| {
                HabitError::Validation(format!(
                    "no importer for {} (expected .csv or .json)",
                    file_path.display()
                ))
            })?;

        debug!(
            file = %file_path.display(),
            format = importer.get_format_name(),
            "Importing history"
        );
        let history = importer.import_file(file_path)?;
        info!(
            file = %file_path.display(),
            records = history.len(),
            "History imported"
        );
        Ok(history)
    }
}

/// Read a history file, choosing CSV or JSON by extension
pub fn read_history<P: AsRef<Path>>(path: P) -> Result<History> {
    ImportManager::new().import_file(path.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.xlsx");
        fs::write(&path, "irrelevant").unwrap();

        assert!(matches!(read_history(&path), Err(HabitError::Validation(_))));
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert_eq!(extension(Path::new("a/b/History.CSV")).as_deref(), Some("csv"));
        assert_eq!(extension(Path::new("no_extension")), None);
    }
}
