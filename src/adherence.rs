//! Next-day exercise adherence classifier
//!
//! A row for day *t* is labeled with whether the following record is an
//! exercise day, so a prediction made on today's row answers "will the user
//! exercise tomorrow?". The model is an L2-regularized logistic regression
//! over standardized features, fitted by full-batch gradient descent. Its
//! coefficients stay inspectable so recommendations can cite their drivers.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{HabitError, Result};
use crate::features::{FeatureRow, FeatureScaler, FEATURE_COUNT, FEATURE_NAMES};

/// Logistic regression hyperparameters and evaluation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdherenceConfig {
    /// Trailing share of labeled rows held out for evaluation
    pub holdout_fraction: f64,

    /// Fewer labeled rows than this is a `DataInsufficient` error
    pub min_labeled_rows: usize,

    pub learning_rate: f64,
    pub iterations: usize,
    pub l2_penalty: f64,

    /// Reweight classes inversely to their frequency
    pub balance_classes: bool,

    /// Probability at or above which a day counts as predicted exercise
    pub decision_threshold: f64,
}

impl Default for AdherenceConfig {
    fn default() -> Self {
        Self {
            holdout_fraction: 0.2,
            min_labeled_rows: 10,
            learning_rate: 0.1,
            iterations: 1000,
            l2_penalty: 0.01,
            balance_classes: true,
            decision_threshold: 0.5,
        }
    }
}

impl AdherenceConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.holdout_fraction) {
            return Err(HabitError::Configuration(format!(
                "adherence.holdout_fraction must be in [0, 1), got {}",
                self.holdout_fraction
            )));
        }
        if self.min_labeled_rows < 2 {
            return Err(HabitError::Configuration(
                "adherence.min_labeled_rows must be at least 2".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0) || !(self.l2_penalty >= 0.0) {
            return Err(HabitError::Configuration(
                "adherence.learning_rate must be positive and l2_penalty non-negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.decision_threshold) {
            return Err(HabitError::Configuration(format!(
                "adherence.decision_threshold must be in [0, 1], got {}",
                self.decision_threshold
            )));
        }
        Ok(())
    }
}

/// One feature's share of a prediction's log-odds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub contribution: f64,
}

/// Fitted next-day adherence classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdherenceModel {
    scaler: FeatureScaler,
    weights: Vec<f64>,
    intercept: f64,
    accuracy: f64,
    training_rows: usize,
    holdout_rows: usize,
}

/// Pair each row with whether the next record was an exercise day
///
/// The final row has no known tomorrow and is dropped.
pub fn next_day_labels(rows: &[FeatureRow]) -> (Vec<&FeatureRow>, Vec<bool>) {
    rows.windows(2)
        .map(|pair| (&pair[0], pair[1].exercise_done))
        .unzip()
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl AdherenceModel {
    /// Fit on rows and their next-day labels, evaluating on a temporal holdout
    pub fn fit(rows: &[&FeatureRow], labels: &[bool], config: &AdherenceConfig) -> Result<Self> {
        if rows.len() != labels.len() {
            return Err(HabitError::Internal(format!(
                "adherence rows ({}) and labels ({}) differ in length",
                rows.len(),
                labels.len()
            )));
        }
        // The temporal split needs at least one training and one holdout row
        let required = config.min_labeled_rows.max(2);
        if rows.len() < required {
            return Err(HabitError::insufficient("adherence", required, rows.len()));
        }

        // Time-ordered split: the holdout is always the most recent days
        let total = rows.len();
        let split = ((total as f64) * (1.0 - config.holdout_fraction)).floor() as usize;
        let split = split.clamp(1, total - 1);

        let samples: Vec<[f64; FEATURE_COUNT]> = rows.iter().map(|r| r.to_vector()).collect();
        let (train_x, test_x) = samples.split_at(split);
        let (train_y, test_y) = labels.split_at(split);

        let scaler = FeatureScaler::fit(train_x);
        let train_z = scaler.transform_all(train_x);
        let (weights, intercept) = Self::gradient_descent(&train_z, train_y, config);

        let mut model = Self {
            scaler,
            weights,
            intercept,
            accuracy: 0.0,
            training_rows: train_x.len(),
            holdout_rows: test_x.len(),
        };

        let correct = test_x
            .iter()
            .zip(test_y)
            .filter(|(x, y)| (model.probability_of(x) >= config.decision_threshold) == **y)
            .count();
        model.accuracy = correct as f64 / test_x.len() as f64;

        info!(
            training_rows = model.training_rows,
            holdout_rows = model.holdout_rows,
            accuracy = model.accuracy,
            "Adherence model trained"
        );

        Ok(model)
    }

    fn gradient_descent(
        samples: &[[f64; FEATURE_COUNT]],
        labels: &[bool],
        config: &AdherenceConfig,
    ) -> (Vec<f64>, f64) {
        let n = samples.len() as f64;
        let positives = labels.iter().filter(|&&y| y).count() as f64;
        let negatives = n - positives;

        // Balanced weights n / (2 * n_class); a missing class keeps unit weight
        let balanced = config.balance_classes && positives > 0.0 && negatives > 0.0;
        let (pos_weight, neg_weight) = if balanced {
            (n / (2.0 * positives), n / (2.0 * negatives))
        } else {
            (1.0, 1.0)
        };

        let mut weights = vec![0.0; FEATURE_COUNT];
        let mut intercept = 0.0;

        for _ in 0..config.iterations {
            let mut grad_w = [0.0f64; FEATURE_COUNT];
            let mut grad_b = 0.0f64;

            for (x, &y) in samples.iter().zip(labels) {
                let z = intercept + x.iter().zip(&weights).map(|(a, b)| a * b).sum::<f64>();
                let target = if y { 1.0 } else { 0.0 };
                let sample_weight = if y { pos_weight } else { neg_weight };
                let error = sample_weight * (sigmoid(z) - target);

                for (g, v) in grad_w.iter_mut().zip(x.iter()) {
                    *g += error * v;
                }
                grad_b += error;
            }

            for (w, g) in weights.iter_mut().zip(grad_w.iter()) {
                *w -= config.learning_rate * (g / n + config.l2_penalty * *w);
            }
            intercept -= config.learning_rate * grad_b / n;
        }

        debug!(intercept, ?weights, "Adherence gradient descent finished");
        (weights, intercept)
    }

    fn log_odds(&self, raw: &[f64; FEATURE_COUNT]) -> f64 {
        let z = self.scaler.transform(raw);
        self.intercept + z.iter().zip(&self.weights).map(|(a, b)| a * b).sum::<f64>()
    }

    fn probability_of(&self, raw: &[f64; FEATURE_COUNT]) -> f64 {
        let p = sigmoid(self.log_odds(raw));
        if p.is_finite() {
            p.clamp(0.0, 1.0)
        } else {
            0.5
        }
    }

    /// Probability in [0, 1] that the user exercises on the day after `row`
    pub fn predict_probability(&self, row: &FeatureRow) -> f64 {
        self.probability_of(&row.to_vector())
    }

    /// Holdout accuracy measured during fitting
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Coefficients on standardized features, in feature order
    pub fn coefficients(&self) -> Vec<(&'static str, f64)> {
        FEATURE_NAMES
            .iter()
            .copied()
            .zip(self.weights.iter().copied())
            .collect()
    }

    /// Per-feature log-odds contributions for `row`, largest magnitude first
    pub fn explain(&self, row: &FeatureRow) -> Vec<FeatureContribution> {
        let z = self.scaler.transform(&row.to_vector());
        let mut contributions: Vec<FeatureContribution> = FEATURE_NAMES
            .iter()
            .zip(z.iter().zip(&self.weights))
            .map(|(name, (value, weight))| FeatureContribution {
                feature: (*name).to_string(),
                contribution: value * weight,
            })
            .collect();
        contributions.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
        contributions
    }
}
