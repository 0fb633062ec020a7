//! Feature engineering shared by the adherence and burnout models
//!
//! Rows are recomputed from the history on every fit and prediction. Rolling
//! windows are counted in records and shrink at the start of a history, so
//! short histories never fail here.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{HabitError, Result};
use crate::models::{DailyRecord, History, PredictionInput};

/// Guard for divisions by rolling means
const EPSILON: f64 = 1e-6;

/// Number of features in the model vector
pub const FEATURE_COUNT: usize = 21;

/// Feature names, in model vector order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "exercise_done",
    "exercise_minutes",
    "total_steps",
    "sleep_minutes",
    "prev_steps",
    "prev_sleep_minutes",
    "prev_exercise_done",
    "steps_7d_avg",
    "sleep_7d_avg",
    "steps_7d_std",
    "sleep_7d_std",
    "sleep_consistency",
    "steps_3d_avg",
    "sleep_3d_avg",
    "effort_ratio",
    "rolling_misses_3d",
    "current_streak",
    "longest_streak",
    "consecutive_misses",
    "sleep_debt",
    "is_weekend",
];

/// Window sizes and baselines used by the feature builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Short window used for the burnout event definition
    pub short_window: usize,

    /// Main rolling window (7 days)
    pub rolling_window: usize,

    /// Long window used as the load baseline for `effort_ratio`
    pub long_window: usize,

    /// Leading records used only as context, never emitted as rows
    pub min_context_days: usize,

    /// Nightly sleep below this accumulates sleep debt
    pub sleep_baseline_minutes: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            short_window: 3,
            rolling_window: 7,
            long_window: 30,
            min_context_days: 2,
            sleep_baseline_minutes: 480.0,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.short_window == 0 || self.rolling_window == 0 || self.long_window == 0 {
            return Err(HabitError::Configuration(
                "feature windows must be at least one day".to_string(),
            ));
        }
        if !self.sleep_baseline_minutes.is_finite() || self.sleep_baseline_minutes < 0.0 {
            return Err(HabitError::Configuration(format!(
                "sleep_baseline_minutes must be non-negative, got {}",
                self.sleep_baseline_minutes
            )));
        }
        Ok(())
    }
}

/// Engineered features for one day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub exercise_done: bool,
    pub exercise_minutes: f64,
    pub total_steps: f64,
    pub sleep_minutes: f64,
    pub prev_steps: f64,
    pub prev_sleep_minutes: f64,
    pub prev_exercise_done: bool,
    pub steps_7d_avg: f64,
    pub sleep_7d_avg: f64,
    pub steps_7d_std: f64,
    pub sleep_7d_std: f64,
    /// 1 / (1 + coefficient of variation of sleep); higher is steadier
    pub sleep_consistency: f64,
    pub steps_3d_avg: f64,
    pub sleep_3d_avg: f64,
    /// Recent load relative to the long baseline
    pub effort_ratio: f64,
    pub rolling_misses_3d: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub consecutive_misses: u32,
    /// Minutes of sleep below baseline since the last fully rested night
    pub sleep_debt: f64,
    pub is_weekend: bool,
}

impl FeatureRow {
    /// Flatten into the model vector, ordered as [`FEATURE_NAMES`]
    pub fn to_vector(&self) -> [f64; FEATURE_COUNT] {
        [
            flag(self.exercise_done),
            self.exercise_minutes,
            self.total_steps,
            self.sleep_minutes,
            self.prev_steps,
            self.prev_sleep_minutes,
            flag(self.prev_exercise_done),
            self.steps_7d_avg,
            self.sleep_7d_avg,
            self.steps_7d_std,
            self.sleep_7d_std,
            self.sleep_consistency,
            self.steps_3d_avg,
            self.sleep_3d_avg,
            self.effort_ratio,
            self.rolling_misses_3d as f64,
            self.current_streak as f64,
            self.longest_streak as f64,
            self.consecutive_misses as f64,
            self.sleep_debt,
            flag(self.is_weekend),
        ]
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; 0.0 with fewer than three samples
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Builds feature rows from a history
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// One row per record after the leading context days
    pub fn build(&self, history: &History) -> Vec<FeatureRow> {
        self.build_records(history.records())
    }

    /// Feature row for a pending input treated as the day after the history
    pub fn build_pending(&self, history: &History, input: &PredictionInput) -> Result<FeatureRow> {
        let date = history.next_date().ok_or_else(|| {
            HabitError::Validation("cannot build features against an empty history".to_string())
        })?;
        let mut records = history.records().to_vec();
        records.push(input.to_record(date));
        Ok(self.row_at(&records, records.len() - 1))
    }

    fn build_records(&self, records: &[DailyRecord]) -> Vec<FeatureRow> {
        (self.config.min_context_days..records.len())
            .map(|idx| self.row_at(records, idx))
            .collect()
    }

    /// Compute the row for `records[idx]` using only records up to `idx`
    fn row_at(&self, records: &[DailyRecord], idx: usize) -> FeatureRow {
        let seen = &records[..=idx];
        let today = &records[idx];
        let prev = idx.checked_sub(1).map(|p| &records[p]);

        let steps: Vec<f64> = seen.iter().map(|r| r.total_steps as f64).collect();
        let sleep: Vec<f64> = seen.iter().map(|r| r.sleep_duration_minutes as f64).collect();

        let rolling_steps = trailing(&steps, self.config.rolling_window);
        let rolling_sleep = trailing(&sleep, self.config.rolling_window);
        let steps_7d_avg = mean(rolling_steps);
        let sleep_7d_avg = mean(rolling_sleep);
        let sleep_7d_std = sample_std(rolling_sleep);

        let steps_long_avg = mean(trailing(&steps, self.config.long_window));
        let effort_ratio = if steps_long_avg > EPSILON {
            steps_7d_avg / steps_long_avg
        } else {
            1.0
        };

        let misses_window = trailing_records(seen, self.config.short_window);
        let rolling_misses_3d = misses_window.iter().filter(|r| !r.exercise_done).count() as u32;

        let (current_streak, longest_streak) = streaks(seen);
        let consecutive_misses = seen.iter().rev().take_while(|r| !r.exercise_done).count() as u32;

        FeatureRow {
            date: today.date,
            exercise_done: today.exercise_done,
            exercise_minutes: today.exercise_minutes as f64,
            total_steps: today.total_steps as f64,
            sleep_minutes: today.sleep_duration_minutes as f64,
            prev_steps: prev.map_or(0.0, |r| r.total_steps as f64),
            prev_sleep_minutes: prev.map_or(0.0, |r| r.sleep_duration_minutes as f64),
            prev_exercise_done: prev.is_some_and(|r| r.exercise_done),
            steps_7d_avg,
            sleep_7d_avg,
            steps_7d_std: sample_std(rolling_steps),
            sleep_7d_std,
            sleep_consistency: 1.0 / (1.0 + sleep_7d_std / (sleep_7d_avg + EPSILON)),
            steps_3d_avg: mean(trailing(&steps, self.config.short_window)),
            sleep_3d_avg: mean(trailing(&sleep, self.config.short_window)),
            effort_ratio,
            rolling_misses_3d,
            current_streak,
            longest_streak,
            consecutive_misses,
            sleep_debt: sleep_debt(seen, self.config.sleep_baseline_minutes),
            is_weekend: matches!(today.date.weekday(), Weekday::Sat | Weekday::Sun),
        }
    }
}

fn trailing(values: &[f64], window: usize) -> &[f64] {
    &values[values.len().saturating_sub(window)..]
}

fn trailing_records(records: &[DailyRecord], window: usize) -> &[DailyRecord] {
    &records[records.len().saturating_sub(window)..]
}

/// (current streak ending at the last record, longest streak so far)
fn streaks(records: &[DailyRecord]) -> (u32, u32) {
    let mut current = 0u32;
    let mut longest = 0u32;
    for record in records {
        if record.exercise_done {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    (current, longest)
}

fn sleep_debt(records: &[DailyRecord], baseline: f64) -> f64 {
    records
        .iter()
        .rev()
        .map(|r| r.sleep_duration_minutes as f64)
        .take_while(|&minutes| minutes < baseline)
        .map(|minutes| baseline - minutes)
        .sum()
}

/// Per-feature standardization fitted on training rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    means: Vec<f64>,
    std_devs: Vec<f64>,
}

impl FeatureScaler {
    /// Fit means and standard deviations; zero-variance features keep a unit scale
    pub fn fit(samples: &[[f64; FEATURE_COUNT]]) -> Self {
        let n = samples.len().max(1) as f64;
        let mut means = vec![0.0; FEATURE_COUNT];
        for sample in samples {
            for (m, v) in means.iter_mut().zip(sample.iter()) {
                *m += v / n;
            }
        }

        let mut std_devs = vec![0.0; FEATURE_COUNT];
        for sample in samples {
            for ((s, v), m) in std_devs.iter_mut().zip(sample.iter()).zip(means.iter()) {
                *s += (v - m).powi(2) / n;
            }
        }
        for s in std_devs.iter_mut() {
            *s = s.sqrt();
            if !s.is_finite() || *s < EPSILON {
                *s = 1.0;
            }
        }

        Self { means, std_devs }
    }

    pub fn transform(&self, sample: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, value) in sample.iter().enumerate() {
            out[i] = (value - self.means[i]) / self.std_devs[i];
        }
        out
    }

    pub fn transform_all(&self, samples: &[[f64; FEATURE_COUNT]]) -> Vec<[f64; FEATURE_COUNT]> {
        samples.iter().map(|s| self.transform(s)).collect()
    }
}
