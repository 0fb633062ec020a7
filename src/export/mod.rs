use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{HabitError, Result};
use crate::import::extension;
use crate::models::History;

pub mod csv;
pub mod json;
pub mod text;

/// File formats a history can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(HabitError::Validation(format!(
                "unsupported export format: {}",
                s
            ))),
        }
    }

    /// Format implied by the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = extension(path).ok_or_else(|| {
            HabitError::Validation(format!(
                "cannot infer export format for {} (expected .csv or .json)",
                path.display()
            ))
        })?;
        Self::from_str(&ext)
    }
}

/// Write a history to `path`, choosing CSV or JSON by extension
pub fn write_history<P: AsRef<Path>>(path: P, history: &History) -> Result<()> {
    let path = path.as_ref();
    match ExportFormat::from_path(path)? {
        ExportFormat::Csv => csv::export_history(history, path)?,
        ExportFormat::Json => json::export_pretty(history, path)?,
    }
    info!(file = %path.display(), records = history.len(), "History written");
    Ok(())
}

/// Pretty JSON for any report or recommendation payload
pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::read_history;
    use crate::models::DailyRecord;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn sample_history() -> History {
        let day = |d| NaiveDate::from_ymd_opt(2024, 5, d).unwrap();
        History::new(vec![
            DailyRecord::new(day(1), 8000, 450, 30),
            DailyRecord::new(day(2), 6500, 400, 0),
            DailyRecord::new(day(3), 10400, 480, 55),
        ])
        .unwrap()
    }

    #[test]
    fn test_history_survives_both_formats() {
        let dir = tempdir().unwrap();
        let history = sample_history();

        for name in ["history.csv", "nested/history.json"] {
            let path = dir.path().join(name);
            write_history(&path, &history).unwrap();
            assert_eq!(read_history(&path).unwrap(), history);
        }
    }

    #[test]
    fn test_unknown_format_rejected() {
        let dir = tempdir().unwrap();
        let result = write_history(dir.path().join("history.parquet"), &sample_history());
        assert!(matches!(result, Err(HabitError::Validation(_))));
        assert!(ExportFormat::from_path(Path::new("history")).is_err());
    }
}
