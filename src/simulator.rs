//! Synthetic history generation
//!
//! Produces plausible daily records from a handful of summary statistics so
//! the models can be trained before any real data exists. Generation is fully
//! determined by the seed.

use chrono::{Duration, NaiveDate, Utc};
use rand::distributions::Distribution;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use statrs::distribution::Normal;
use tracing::debug;

use crate::error::{HabitError, Result};
use crate::models::{DailyRecord, History, SimulationParams};

/// Longest history the simulator will produce
pub const MAX_HISTORY_DAYS: i64 = 3650;

/// Mean and spread of a simulated exercise session in minutes
const SESSION_MEAN_MINUTES: f64 = 40.0;
const SESSION_STD_MINUTES: f64 = 10.0;
const SESSION_MIN_MINUTES: f64 = 20.0;
const SESSION_MAX_MINUTES: f64 = 60.0;

/// Simulation parameters after validation and clamping
#[derive(Debug, Clone, PartialEq)]
struct ResolvedParams {
    days: usize,
    avg_steps: f64,
    steps_std: f64,
    sleep_mean_minutes: f64,
    sleep_std_minutes: f64,
    exercise_probability: f64,
}

impl ResolvedParams {
    fn resolve(params: &SimulationParams) -> Result<Self> {
        if params.history_days < 1 || params.history_days > MAX_HISTORY_DAYS {
            return Err(HabitError::Validation(format!(
                "history_days must be between 1 and {}, got {}",
                MAX_HISTORY_DAYS, params.history_days
            )));
        }
        if !params.avg_steps.is_finite() || params.avg_steps < 0.0 {
            return Err(HabitError::Validation(format!(
                "avg_steps must be a non-negative number, got {}",
                params.avg_steps
            )));
        }
        if !params.avg_sleep_hours.is_finite() || !(0.0..=24.0).contains(&params.avg_sleep_hours)
        {
            return Err(HabitError::Validation(format!(
                "avg_sleep_hours must be between 0 and 24, got {}",
                params.avg_sleep_hours
            )));
        }
        for (name, value) in [
            ("steps_volatility", params.steps_volatility),
            ("sleep_volatility", params.sleep_volatility),
            ("exercise_freq", params.exercise_freq),
        ] {
            if value.is_nan() {
                return Err(HabitError::Validation(format!("{} must be a number", name)));
            }
        }

        let sleep_mean_minutes = params.avg_sleep_hours * 60.0;
        Ok(Self {
            days: params.history_days as usize,
            avg_steps: params.avg_steps,
            steps_std: params.avg_steps * params.steps_volatility.clamp(0.0, 1.0),
            sleep_mean_minutes,
            sleep_std_minutes: sleep_mean_minutes * params.sleep_volatility.clamp(0.0, 1.0),
            exercise_probability: params.exercise_freq.clamp(0.0, 7.0) / 7.0,
        })
    }
}

/// Seeded generator of synthetic daily histories
#[derive(Debug, Clone)]
pub struct HistorySimulator {
    rng: ChaCha8Rng,
}

impl HistorySimulator {
    /// Create a simulator with a deterministic seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Create a simulator seeded from the params, or from entropy when unset
    pub fn for_params(params: &SimulationParams) -> Self {
        match params.seed {
            Some(seed) => Self::new(seed),
            None => Self {
                rng: ChaCha8Rng::from_entropy(),
            },
        }
    }

    /// Generate a history ending at `params.end_date` (today when unset)
    pub fn generate(&mut self, params: &SimulationParams) -> Result<History> {
        let resolved = ResolvedParams::resolve(params)?;
        let end_date = params.end_date.unwrap_or_else(|| Utc::now().date_naive());
        let start_date = end_date - Duration::days(resolved.days as i64 - 1);

        let mut records = Vec::with_capacity(resolved.days);
        for offset in 0..resolved.days {
            let date = start_date + Duration::days(offset as i64);
            records.push(self.simulate_day(date, &resolved));
        }

        let exercise_days = records.iter().filter(|r| r.exercise_done).count();
        debug!(
            days = resolved.days,
            exercise_days,
            start = %start_date,
            end = %end_date,
            "Simulated history"
        );

        History::new(records)
    }

    fn simulate_day(&mut self, date: NaiveDate, params: &ResolvedParams) -> DailyRecord {
        let steps = self.draw_normal(params.avg_steps, params.steps_std).max(0.0);
        let sleep = self
            .draw_normal(params.sleep_mean_minutes, params.sleep_std_minutes)
            .max(0.0);

        let exercise_minutes = if self.rng.gen_bool(params.exercise_probability) {
            self.draw_normal(SESSION_MEAN_MINUTES, SESSION_STD_MINUTES)
                .clamp(SESSION_MIN_MINUTES, SESSION_MAX_MINUTES)
        } else {
            0.0
        };

        DailyRecord::new(
            date,
            steps.round() as u32,
            sleep.round() as u32,
            exercise_minutes.round() as u32,
        )
    }

    /// Normal draw that degrades to the mean when there is no spread
    fn draw_normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        match Normal::new(mean, std_dev) {
            Ok(normal) if std_dev > 0.0 => normal.sample(&mut self.rng),
            _ => mean,
        }
    }
}

/// Convenience wrapper: generate a history using the params' own seed
pub fn simulate_history(params: &SimulationParams) -> Result<History> {
    HistorySimulator::for_params(params).generate(params)
}
