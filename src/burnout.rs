//! Burnout risk as a proportional hazards model
//!
//! # Event definition
//!
//! A day is a burnout event when both the short rolling sleep mean and the
//! short rolling step mean fall below fixed floors. For every feature row the
//! time to event is the number of calendar days until the next later event
//! day; rows with no later event are right-censored at the end of the history.
//!
//! # Model
//!
//! ```text
//! h(t|x) = h0(t) * exp(beta . z(x))
//! ```
//!
//! `z` is the standardized feature vector, so a day at the training mean has
//! a hazard ratio of exactly 1.0. `beta` maximizes the ridge-penalized Breslow
//! partial log-likelihood by gradient ascent.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{HabitError, Result};
use crate::features::{FeatureRow, FeatureScaler, FEATURE_COUNT, FEATURE_NAMES};

/// Event floors and fitting hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurnoutConfig {
    /// Short rolling sleep mean below this counts toward an event
    pub sleep_floor_minutes: f64,

    /// Short rolling step mean below this counts toward an event
    pub steps_floor: f64,

    /// Fewer rows than this is a `DataInsufficient` error
    pub min_rows: usize,

    pub learning_rate: f64,
    pub iterations: usize,
    pub l2_penalty: f64,

    /// Bound on |beta . z| so hazards stay finite
    pub max_linear_predictor: f64,
}

impl Default for BurnoutConfig {
    fn default() -> Self {
        Self {
            sleep_floor_minutes: 420.0,
            steps_floor: 6500.0,
            min_rows: 10,
            learning_rate: 0.1,
            iterations: 300,
            l2_penalty: 0.1,
            max_linear_predictor: 20.0,
        }
    }
}

impl BurnoutConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.sleep_floor_minutes.is_finite() || !self.steps_floor.is_finite() {
            return Err(HabitError::Configuration(
                "burnout floors must be finite numbers".to_string(),
            ));
        }
        if self.min_rows < 2 {
            return Err(HabitError::Configuration(
                "burnout.min_rows must be at least 2".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0)
            || !(self.l2_penalty >= 0.0)
            || !(self.max_linear_predictor > 0.0)
        {
            return Err(HabitError::Configuration(
                "burnout.learning_rate and max_linear_predictor must be positive, l2_penalty non-negative"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a row meets the burnout event definition
    pub fn is_event(&self, row: &FeatureRow) -> bool {
        row.sleep_3d_avg < self.sleep_floor_minutes && row.steps_3d_avg < self.steps_floor
    }
}

/// A possibly right-censored survival observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurvivalTime {
    /// Days until the next event, or until the end of history when censored
    pub days: f64,
    pub event_observed: bool,
}

/// Compute time-to-next-event for each row (rows must be in date order)
pub fn time_to_event(rows: &[FeatureRow], config: &BurnoutConfig) -> Vec<SurvivalTime> {
    let Some(last_date) = rows.last().map(|r| r.date) else {
        return Vec::new();
    };

    let mut next_event: Option<NaiveDate> = None;
    let mut times = vec![
        SurvivalTime {
            days: 0.0,
            event_observed: false,
        };
        rows.len()
    ];

    // Walk backwards so each row sees the nearest strictly later event
    for (idx, row) in rows.iter().enumerate().rev() {
        times[idx] = match next_event {
            Some(event_date) => SurvivalTime {
                days: (event_date - row.date).num_days() as f64,
                event_observed: true,
            },
            None => SurvivalTime {
                days: (last_date - row.date).num_days() as f64,
                event_observed: false,
            },
        };
        if config.is_event(row) {
            next_event = Some(row.date);
        }
    }

    times
}

/// Harrell's concordance index
///
/// A pair is comparable when the observation with the shorter time had an
/// observed event; censored-first pairs and equal times are skipped. A pair is
/// concordant when the shorter-lived observation also has the higher hazard,
/// and hazard ties count as half. Returns 0.5 when nothing is comparable.
pub fn concordance_index(times: &[f64], hazards: &[f64], events: &[bool]) -> f64 {
    let n = times.len().min(hazards.len()).min(events.len());
    let mut comparable = 0.0;
    let mut concordant = 0.0;

    for i in 0..n {
        if !events[i] {
            continue;
        }
        for j in 0..n {
            if times[i] < times[j] {
                comparable += 1.0;
                if hazards[i] > hazards[j] {
                    concordant += 1.0;
                } else if hazards[i] == hazards[j] {
                    concordant += 0.5;
                }
            }
        }
    }

    if comparable == 0.0 {
        0.5
    } else {
        concordant / comparable
    }
}

/// Fitted proportional hazards model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnoutModel {
    scaler: FeatureScaler,
    beta: Vec<f64>,
    max_linear_predictor: f64,
    c_index: f64,
    events_observed: usize,
}

impl BurnoutModel {
    /// Fit on rows with their survival times
    ///
    /// A history without any event yields a degenerate model whose hazard is
    /// the baseline everywhere; that is a valid outcome, not an error.
    pub fn fit(
        rows: &[FeatureRow],
        times: &[SurvivalTime],
        config: &BurnoutConfig,
    ) -> Result<Self> {
        if rows.len() != times.len() {
            return Err(HabitError::Internal(format!(
                "burnout rows ({}) and survival times ({}) differ in length",
                rows.len(),
                times.len()
            )));
        }
        let required = config.min_rows.max(2);
        if rows.len() < required {
            return Err(HabitError::insufficient("burnout", required, rows.len()));
        }

        let samples: Vec<[f64; FEATURE_COUNT]> = rows.iter().map(|r| r.to_vector()).collect();
        let scaler = FeatureScaler::fit(&samples);
        let z = scaler.transform_all(&samples);
        let events_observed = times.iter().filter(|t| t.event_observed).count();

        let beta = if events_observed == 0 {
            warn!(
                rows = rows.len(),
                "No burnout events in history; hazard stays at baseline"
            );
            vec![0.0; FEATURE_COUNT]
        } else {
            Self::gradient_ascent(&z, times, config)
        };

        let mut model = Self {
            scaler,
            beta,
            max_linear_predictor: config.max_linear_predictor,
            c_index: 0.5,
            events_observed,
        };

        let hazards: Vec<f64> = samples.iter().map(|x| model.hazard_of(x)).collect();
        let durations: Vec<f64> = times.iter().map(|t| t.days).collect();
        let events: Vec<bool> = times.iter().map(|t| t.event_observed).collect();
        model.c_index = concordance_index(&durations, &hazards, &events);

        info!(
            rows = rows.len(),
            events = events_observed,
            c_index = model.c_index,
            "Burnout model trained"
        );

        Ok(model)
    }

    /// Gradient ascent on the penalized Breslow partial log-likelihood
    fn gradient_ascent(
        z: &[[f64; FEATURE_COUNT]],
        times: &[SurvivalTime],
        config: &BurnoutConfig,
    ) -> Vec<f64> {
        let n = z.len() as f64;

        // Longest times first, so the risk set {j : t_j >= t_i} only grows
        let mut order: Vec<usize> = (0..z.len()).collect();
        order.sort_by(|&a, &b| times[b].days.total_cmp(&times[a].days));

        let mut beta = vec![0.0; FEATURE_COUNT];

        for _ in 0..config.iterations {
            let mut grad = [0.0f64; FEATURE_COUNT];
            let mut risk_sum = 0.0f64;
            let mut risk_weighted = [0.0f64; FEATURE_COUNT];

            let mut start = 0;
            while start < order.len() {
                // Tied times enter the risk set together before any of them is scored
                let t = times[order[start]].days;
                let mut end = start;
                while end < order.len() && times[order[end]].days == t {
                    let x = &z[order[end]];
                    let lin = x.iter().zip(&beta).map(|(a, b)| a * b).sum::<f64>();
                    let w = lin
                        .clamp(-config.max_linear_predictor, config.max_linear_predictor)
                        .exp();
                    risk_sum += w;
                    for (acc, v) in risk_weighted.iter_mut().zip(x.iter()) {
                        *acc += w * v;
                    }
                    end += 1;
                }

                for &idx in &order[start..end] {
                    if !times[idx].event_observed || risk_sum <= 0.0 {
                        continue;
                    }
                    for k in 0..FEATURE_COUNT {
                        grad[k] += z[idx][k] - risk_weighted[k] / risk_sum;
                    }
                }
                start = end;
            }

            for (b, g) in beta.iter_mut().zip(grad.iter()) {
                *b += config.learning_rate * (g / n - config.l2_penalty * *b);
            }
        }

        debug!(?beta, "Burnout gradient ascent finished");
        beta
    }

    fn hazard_of(&self, raw: &[f64; FEATURE_COUNT]) -> f64 {
        let z = self.scaler.transform(raw);
        let lin = z.iter().zip(&self.beta).map(|(a, b)| a * b).sum::<f64>();
        let hazard = lin
            .clamp(-self.max_linear_predictor, self.max_linear_predictor)
            .exp();
        if hazard.is_finite() {
            hazard
        } else {
            1.0
        }
    }

    /// Hazard ratio for `row`; 1.0 is the training-average day, never negative
    pub fn predict_hazard(&self, row: &FeatureRow) -> f64 {
        self.hazard_of(&row.to_vector())
    }

    /// Concordance on the training observations
    pub fn c_index(&self) -> f64 {
        self.c_index
    }

    pub fn events_observed(&self) -> usize {
        self.events_observed
    }

    /// Coefficients on standardized features, in feature order
    pub fn coefficients(&self) -> Vec<(&'static str, f64)> {
        FEATURE_NAMES
            .iter()
            .copied()
            .zip(self.beta.iter().copied())
            .collect()
    }
}
