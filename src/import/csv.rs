use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

use crate::error::Result;
use crate::import::{extension, ImportFormat};
use crate::models::{DailyRecord, History};

/// CSV importer
///
/// Expects a header row with `date,total_steps,sleep_duration_minutes,exercise_minutes`
/// and an optional `exercise_done` column, which must agree with the minutes
/// when present.
pub struct CsvImporter;

impl CsvImporter {
    pub fn new() -> Self {
        Self
    }

    /// Parse records from any reader
    pub fn read_from<R: std::io::Read>(&self, reader: R) -> Result<History> {
        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(false)
            .from_reader(reader);

        let mut records = Vec::new();
        for result in rdr.deserialize::<DailyRecord>() {
            records.push(result?);
        }
        History::new(records)
    }
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for CsvImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        extension(file_path).as_deref() == Some("csv")
    }

    fn import_file(&self, file_path: &Path) -> Result<History> {
        self.read_from(File::open(file_path)?)
    }

    fn get_format_name(&self) -> &'static str {
        "CSV"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HabitError;
    use chrono::NaiveDate;

    #[test]
    fn test_reads_rows_in_date_order() {
        let data = "\
date,total_steps,sleep_duration_minutes,exercise_minutes
2024-03-02, 9000, 430, 0
2024-03-01, 8123, 451.6, 35
";
        let history = CsvImporter::new().read_from(data.as_bytes()).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history.first_date(), NaiveDate::from_ymd_opt(2024, 3, 1));
        let first = &history.records()[0];
        assert_eq!(first.sleep_duration_minutes, 452);
        assert!(first.exercise_done);
    }

    #[test]
    fn test_optional_exercise_done_column() {
        let data = "\
date,total_steps,sleep_duration_minutes,exercise_minutes,exercise_done
2024-03-01,8000,450,30,true
2024-03-02,8000,450,0,false
";
        assert_eq!(CsvImporter::new().read_from(data.as_bytes()).unwrap().len(), 2);

        let contradictory = "\
date,total_steps,sleep_duration_minutes,exercise_minutes,exercise_done
2024-03-01,8000,450,0,true
";
        assert!(matches!(
            CsvImporter::new().read_from(contradictory.as_bytes()),
            Err(HabitError::Csv(_))
        ));
    }

    #[test]
    fn test_malformed_rows_rejected() {
        for data in [
            "date,total_steps,sleep_duration_minutes,exercise_minutes\nnot-a-date,1,1,1\n",
            "date,total_steps,sleep_duration_minutes,exercise_minutes\n2024-03-01,-4,1,1\n",
            "date,total_steps,sleep_duration_minutes,exercise_minutes\n2024-03-01,1,1\n",
        ] {
            assert!(CsvImporter::new().read_from(data.as_bytes()).is_err());
        }
    }

    #[test]
    fn test_duplicate_dates_rejected() {
        let data = "\
date,total_steps,sleep_duration_minutes,exercise_minutes
2024-03-01,8000,450,30
2024-03-01,7000,420,0
";
        assert!(matches!(
            CsvImporter::new().read_from(data.as_bytes()),
            Err(HabitError::Validation(_))
        ));
    }
}
