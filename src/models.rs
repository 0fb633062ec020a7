use crate::error::{HabitError, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Minimum number of daily records required before any model is fitted
pub const MIN_HISTORY_DAYS: usize = 14;

/// One calendar day of activity
///
/// `exercise_done` is always derived from `exercise_minutes`, so the two can
/// never disagree. Deserialization goes through [`RawDailyRecord`] which
/// accepts fractional minutes the way edited front-end data arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDailyRecord")]
pub struct DailyRecord {
    /// Calendar date, unique within a history
    pub date: NaiveDate,

    /// Total steps for the day
    pub total_steps: u32,

    /// Main sleep duration ending on this day
    pub sleep_duration_minutes: u32,

    /// Minutes of deliberate exercise
    pub exercise_minutes: u32,

    /// True iff `exercise_minutes > 0`
    pub exercise_done: bool,
}

impl DailyRecord {
    pub fn new(
        date: NaiveDate,
        total_steps: u32,
        sleep_duration_minutes: u32,
        exercise_minutes: u32,
    ) -> Self {
        Self {
            date,
            total_steps,
            sleep_duration_minutes,
            exercise_minutes,
            exercise_done: exercise_minutes > 0,
        }
    }

    /// Sleep expressed in hours
    pub fn sleep_hours(&self) -> f64 {
        self.sleep_duration_minutes as f64 / 60.0
    }
}

/// Loosely-typed record shape accepted from CSV/JSON input
#[derive(Debug, Clone, Deserialize)]
pub struct RawDailyRecord {
    pub date: NaiveDate,
    pub total_steps: f64,
    pub sleep_duration_minutes: f64,
    pub exercise_minutes: f64,
    #[serde(default)]
    pub exercise_done: Option<bool>,
}

fn non_negative_count(field: &str, value: f64, date: NaiveDate) -> Result<u32> {
    if !value.is_finite() || value < 0.0 {
        return Err(HabitError::Validation(format!(
            "{} on {} must be a non-negative number, got {}",
            field, date, value
        )));
    }
    if value > u32::MAX as f64 {
        return Err(HabitError::Validation(format!(
            "{} on {} is out of range: {}",
            field, date, value
        )));
    }
    Ok(value.round() as u32)
}

impl TryFrom<RawDailyRecord> for DailyRecord {
    type Error = HabitError;

    fn try_from(raw: RawDailyRecord) -> Result<Self> {
        let total_steps = non_negative_count("total_steps", raw.total_steps, raw.date)?;
        let sleep = non_negative_count(
            "sleep_duration_minutes",
            raw.sleep_duration_minutes,
            raw.date,
        )?;
        let exercise = non_negative_count("exercise_minutes", raw.exercise_minutes, raw.date)?;

        let record = DailyRecord::new(raw.date, total_steps, sleep, exercise);
        if let Some(flag) = raw.exercise_done {
            if flag != record.exercise_done {
                return Err(HabitError::Validation(format!(
                    "exercise_done={} contradicts exercise_minutes={} on {}",
                    flag, exercise, raw.date
                )));
            }
        }
        Ok(record)
    }
}

/// Ordered daily records, ascending by date with no duplicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DailyRecord>", into = "Vec<DailyRecord>")]
pub struct History {
    records: Vec<DailyRecord>,
}

impl History {
    /// Build a history, sorting by date and rejecting duplicate dates
    ///
    /// Records assembled field by field are checked too: a record whose
    /// `exercise_done` disagrees with its minutes is rejected.
    pub fn new(mut records: Vec<DailyRecord>) -> Result<Self> {
        if let Some(bad) = records
            .iter()
            .find(|r| r.exercise_done != (r.exercise_minutes > 0))
        {
            return Err(HabitError::Validation(format!(
                "exercise_done={} contradicts exercise_minutes={} on {}",
                bad.exercise_done, bad.exercise_minutes, bad.date
            )));
        }
        records.sort_by_key(|r| r.date);
        if let Some(pair) = records.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(HabitError::Validation(format!(
                "duplicate record for {}",
                pair[0].date
            )));
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[DailyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    /// Date a pending prediction input would occupy
    pub fn next_date(&self) -> Option<NaiveDate> {
        self.last_date().map(|d| d + Duration::days(1))
    }

    /// Fail fast when the history is too short to fit models
    pub fn ensure_trainable(&self) -> Result<()> {
        if self.records.len() < MIN_HISTORY_DAYS {
            return Err(HabitError::insufficient(
                "history",
                MIN_HISTORY_DAYS,
                self.records.len(),
            ));
        }
        Ok(())
    }

    /// Return a new history with today's input committed as the latest day
    pub fn commit(&self, input: &PredictionInput) -> Result<Self> {
        let date = self.next_date().ok_or_else(|| {
            HabitError::Validation("cannot commit an input to an empty history".to_string())
        })?;
        let mut records = self.records.clone();
        records.push(input.to_record(date));
        Ok(Self { records })
    }

    /// Records sharing the trailing window that ends at the latest day
    pub fn trailing(&self, window: usize) -> &[DailyRecord] {
        let start = self.records.len().saturating_sub(window);
        &self.records[start..]
    }
}

impl TryFrom<Vec<DailyRecord>> for History {
    type Error = HabitError;

    fn try_from(records: Vec<DailyRecord>) -> Result<Self> {
        History::new(records)
    }
}

impl From<History> for Vec<DailyRecord> {
    fn from(history: History) -> Self {
        history.records
    }
}

/// Today's values supplied for a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    pub steps: u32,
    pub sleep_hours: f64,
    pub exercise_minutes: u32,
}

impl PredictionInput {
    pub fn new(steps: u32, sleep_hours: f64, exercise_minutes: u32) -> Result<Self> {
        let input = Self {
            steps,
            sleep_hours,
            exercise_minutes,
        };
        input.validate()?;
        Ok(input)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sleep_hours.is_finite() || !(0.0..=24.0).contains(&self.sleep_hours) {
            return Err(HabitError::Validation(format!(
                "sleep_hours must be between 0 and 24, got {}",
                self.sleep_hours
            )));
        }
        Ok(())
    }

    pub fn sleep_minutes(&self) -> u32 {
        (self.sleep_hours * 60.0).round() as u32
    }

    /// Materialize the input as a record on `date`
    pub fn to_record(&self, date: NaiveDate) -> DailyRecord {
        DailyRecord::new(date, self.steps, self.sleep_minutes(), self.exercise_minutes)
    }
}

/// Recommendation categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationType {
    /// Encourage getting back to the habit
    Push,
    /// Keep doing what you're doing
    Maintain,
    /// Scale down to protect recovery
    Rest,
    /// Elevated burnout risk
    Warning,
}

impl fmt::Display for RecommendationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationType::Push => write!(f, "push"),
            RecommendationType::Maintain => write!(f, "maintain"),
            RecommendationType::Rest => write!(f, "rest"),
            RecommendationType::Warning => write!(f, "warning"),
        }
    }
}

/// Daily recommendation with its rationale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub recommendation_type: RecommendationType,
    pub message_title: String,
    pub message_body: String,
    pub suggested_action: String,

    /// Probability of exercising tomorrow, in [0, 1]
    pub adherence_probability: f64,

    /// Hazard ratio against a baseline of 1.0
    pub burnout_risk_score: f64,

    pub why_this_recommendation: Vec<String>,
}

/// Summary statistics driving the history simulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub history_days: i64,
    pub avg_steps: f64,

    /// Standard deviation as a fraction of `avg_steps`, clamped to [0, 1]
    pub steps_volatility: f64,

    pub avg_sleep_hours: f64,

    /// Standard deviation as a fraction of sleep minutes, clamped to [0, 1]
    pub sleep_volatility: f64,

    /// Expected exercise days per week, clamped to [0, 7]
    pub exercise_freq: f64,

    /// Fixed seed for reproducible histories; entropy when absent
    pub seed: Option<u64>,

    /// Last simulated day; today (UTC) when absent
    pub end_date: Option<NaiveDate>,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            history_days: 90,
            avg_steps: 8000.0,
            steps_volatility: 0.3,
            avg_sleep_hours: 7.5,
            sleep_volatility: 0.2,
            exercise_freq: 3.0,
            seed: Some(42),
            end_date: None,
        }
    }
}

/// Result of a training operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub message: String,
    pub history_points: usize,
    pub adherence_accuracy: f64,
    pub burnout_c_index: f64,
    pub burnout_events_observed: usize,
    pub adherence_coefficients: BTreeMap<String, f64>,
    pub history: History,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, n).unwrap()
    }

    #[test]
    fn test_exercise_done_derived_from_minutes() {
        assert!(DailyRecord::new(day(1), 8000, 450, 30).exercise_done);
        assert!(!DailyRecord::new(day(1), 8000, 450, 0).exercise_done);
    }

    #[test]
    fn test_history_sorts_and_rejects_duplicates() {
        let history = History::new(vec![
            DailyRecord::new(day(3), 1, 1, 0),
            DailyRecord::new(day(1), 1, 1, 0),
            DailyRecord::new(day(2), 1, 1, 0),
        ])
        .unwrap();
        assert_eq!(history.first_date(), Some(day(1)));
        assert_eq!(history.last_date(), Some(day(3)));

        let duplicate = History::new(vec![
            DailyRecord::new(day(1), 1, 1, 0),
            DailyRecord::new(day(1), 2, 2, 0),
        ]);
        assert!(matches!(duplicate, Err(HabitError::Validation(_))));
    }

    #[test]
    fn test_history_rejects_inconsistent_exercise_flag() {
        let mut records: Vec<DailyRecord> = (1..=20)
            .map(|d| DailyRecord::new(day(d), 8000, 450, if d % 2 == 0 { 30 } else { 0 }))
            .collect();
        records.push(DailyRecord {
            date: day(21),
            total_steps: 8000,
            sleep_duration_minutes: 450,
            exercise_minutes: 0,
            exercise_done: true,
        });
        assert!(matches!(History::new(records), Err(HabitError::Validation(_))));

        let silent_session = vec![DailyRecord {
            exercise_done: false,
            ..DailyRecord::new(day(1), 8000, 450, 25)
        }];
        assert!(History::new(silent_session).is_err());
    }

    #[test]
    fn test_short_history_not_trainable() {
        let records = (1..=5).map(|d| DailyRecord::new(day(d), 5000, 420, 0)).collect();
        let history = History::new(records).unwrap();
        assert!(matches!(
            history.ensure_trainable(),
            Err(HabitError::DataInsufficient { actual: 5, .. })
        ));
    }

    #[test]
    fn test_raw_record_deserialization() {
        let json = r#"{"date":"2024-03-01","total_steps":8123,"sleep_duration_minutes":451.6,"exercise_minutes":0}"#;
        let record: DailyRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.sleep_duration_minutes, 452);
        assert!(!record.exercise_done);

        let contradictory = r#"{"date":"2024-03-01","total_steps":8123,"sleep_duration_minutes":450,"exercise_minutes":0,"exercise_done":true}"#;
        assert!(serde_json::from_str::<DailyRecord>(contradictory).is_err());

        let negative = r#"{"date":"2024-03-01","total_steps":-5,"sleep_duration_minutes":450,"exercise_minutes":0}"#;
        assert!(serde_json::from_str::<DailyRecord>(negative).is_err());
    }

    #[test]
    fn test_prediction_input_validation() {
        assert!(PredictionInput::new(5000, 7.5, 30).is_ok());
        assert!(PredictionInput::new(5000, -1.0, 30).is_err());
        assert!(PredictionInput::new(5000, f64::NAN, 30).is_err());
        assert_eq!(PredictionInput::new(5000, 7.5, 30).unwrap().sleep_minutes(), 450);
    }

    #[test]
    fn test_commit_appends_next_day() {
        let history = History::new(vec![DailyRecord::new(day(1), 1, 1, 0)]).unwrap();
        let input = PredictionInput::new(9000, 8.0, 45).unwrap();
        let committed = history.commit(&input).unwrap();
        assert_eq!(committed.len(), 2);
        assert_eq!(committed.last_date(), Some(day(2)));
        assert!(committed.records()[1].exercise_done);
    }

    #[test]
    fn test_recommendation_type_serialization() {
        let json = serde_json::to_string(&RecommendationType::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }
}
