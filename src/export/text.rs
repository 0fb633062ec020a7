use crate::models::{DailyRecord, History, TrainingReport};
use std::fmt::Write;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Steps")]
    steps: u32,
    #[tabled(rename = "Sleep (h)")]
    sleep_hours: String,
    #[tabled(rename = "Exercise (min)")]
    exercise_minutes: u32,
    #[tabled(rename = "Done")]
    done: &'static str,
}

impl From<&DailyRecord> for HistoryRow {
    fn from(record: &DailyRecord) -> Self {
        Self {
            date: record.date.format("%Y-%m-%d").to_string(),
            steps: record.total_steps,
            sleep_hours: format!("{:.1}", record.sleep_hours()),
            exercise_minutes: record.exercise_minutes,
            done: if record.exercise_done { "yes" } else { "-" },
        }
    }
}

/// Render the last `limit` records as a table (all of them when `None`)
pub fn history_table(history: &History, limit: Option<usize>) -> String {
    let records = match limit {
        Some(n) => history.trailing(n),
        None => history.records(),
    };
    Table::new(records.iter().map(HistoryRow::from))
        .with(Style::rounded())
        .to_string()
}

#[derive(Tabled)]
struct CoefficientRow {
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Coefficient")]
    coefficient: String,
}

/// Human-readable training summary
pub fn training_summary(report: &TrainingReport, top_coefficients: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", report.message);
    let _ = writeln!(out, "History points:      {}", report.history_points);
    let _ = writeln!(out, "Adherence accuracy:  {:.1}%", report.adherence_accuracy * 100.0);
    let _ = writeln!(out, "Burnout C-index:     {:.3}", report.burnout_c_index);
    let _ = writeln!(out, "Burnout events:      {}", report.burnout_events_observed);

    let mut coefficients: Vec<(&String, &f64)> = report.adherence_coefficients.iter().collect();
    coefficients.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    if top_coefficients > 0 && !coefficients.is_empty() {
        let rows = coefficients
            .into_iter()
            .take(top_coefficients)
            .map(|(feature, weight)| CoefficientRow {
                feature: feature.clone(),
                coefficient: format!("{:+.3}", weight),
            });
        let _ = writeln!(out);
        let _ = writeln!(out, "Strongest adherence drivers:");
        let _ = write!(out, "{}", Table::new(rows).with(Style::rounded()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn history() -> History {
        let day = |d| NaiveDate::from_ymd_opt(2024, 5, d).unwrap();
        History::new(vec![
            DailyRecord::new(day(1), 8000, 450, 30),
            DailyRecord::new(day(2), 6500, 400, 0),
        ])
        .unwrap()
    }

    #[test]
    fn test_history_table_limits_rows() {
        let table = history_table(&history(), Some(1));
        assert!(table.contains("2024-05-02"));
        assert!(!table.contains("2024-05-01"));
        assert!(table.contains("Sleep (h)"));

        let full = history_table(&history(), None);
        assert!(full.contains("2024-05-01") && full.contains("7.5"));
    }

    #[test]
    fn test_training_summary_lists_strongest_first() {
        let mut adherence_coefficients = BTreeMap::new();
        adherence_coefficients.insert("current_streak".to_string(), 0.2);
        adherence_coefficients.insert("consecutive_misses".to_string(), -0.9);
        let report = TrainingReport {
            message: "trained".to_string(),
            history_points: 2,
            adherence_accuracy: 0.75,
            burnout_c_index: 0.61,
            burnout_events_observed: 1,
            adherence_coefficients,
            history: history(),
        };

        let text = training_summary(&report, 5);
        assert!(text.contains("75.0%"));
        let misses = text.find("consecutive_misses").unwrap();
        let streak = text.find("current_streak").unwrap();
        assert!(misses < streak);
    }
}
