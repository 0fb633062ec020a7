//! Training orchestration and the per-session engine
//!
//! [`TrainedModelState`] is the owned result of one training pass. [`Engine`]
//! holds at most one live state and swaps it wholesale when a new training
//! pass completes, so predictions never observe a partially fitted model.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use tracing::{debug, info, instrument};

use crate::adherence::{next_day_labels, AdherenceModel};
use crate::burnout::{time_to_event, BurnoutModel};
use crate::config::EngineConfig;
use crate::error::{HabitError, Result};
use crate::features::FeatureBuilder;
use crate::models::{History, PredictionInput, Recommendation, SimulationParams, TrainingReport};
use crate::recommendation::{ModelSignals, RecommendationEngine};
use crate::simulator::simulate_history;

/// Fitted models together with the history they were trained on
#[derive(Debug, Clone)]
pub struct TrainedModelState {
    pub adherence: AdherenceModel,
    pub burnout: BurnoutModel,
    pub history: History,
    pub adherence_accuracy: f64,
    pub burnout_c_index: f64,
    features: FeatureBuilder,
}

impl TrainedModelState {
    /// Run one full fit pass over `history`
    pub fn fit(history: History, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        history.ensure_trainable()?;
        let started = Instant::now();

        let features = FeatureBuilder::with_config(config.features.clone());
        let rows = features.build(&history);

        let (labeled, labels) = next_day_labels(&rows);
        let adherence = AdherenceModel::fit(&labeled, &labels, &config.adherence)?;

        let times = time_to_event(&rows, &config.burnout);
        let burnout = BurnoutModel::fit(&rows, &times, &config.burnout)?;

        info!(
            records = history.len(),
            feature_rows = rows.len(),
            adherence_accuracy = adherence.accuracy(),
            burnout_c_index = burnout.c_index(),
            burnout_events = burnout.events_observed(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Models trained"
        );

        Ok(Self {
            adherence_accuracy: adherence.accuracy(),
            burnout_c_index: burnout.c_index(),
            adherence,
            burnout,
            history,
            features,
        })
    }

    /// Score today's input against the stored history
    pub fn predict(
        &self,
        input: &PredictionInput,
        recommender: &RecommendationEngine,
    ) -> Result<Recommendation> {
        input.validate()?;
        let row = self.features.build_pending(&self.history, input)?;

        let adherence_probability = self.adherence.predict_probability(&row).clamp(0.0, 1.0);
        let burnout_risk_score = self.burnout.predict_hazard(&row).max(0.0);
        debug!(
            adherence_probability,
            burnout_risk_score,
            date = %row.date,
            "Scored pending input"
        );

        let signals = ModelSignals::new(adherence_probability, burnout_risk_score)
            .with_drivers(self.adherence.explain(&row));
        Ok(recommender.generate(&signals, input, &self.history))
    }

    pub fn report(&self) -> TrainingReport {
        let adherence_coefficients: BTreeMap<String, f64> = self
            .adherence
            .coefficients()
            .into_iter()
            .map(|(name, weight)| (name.to_string(), weight))
            .collect();

        TrainingReport {
            message: format!(
                "Models trained successfully on {} days of history",
                self.history.len()
            ),
            history_points: self.history.len(),
            adherence_accuracy: self.adherence_accuracy,
            burnout_c_index: self.burnout_c_index,
            burnout_events_observed: self.burnout.events_observed(),
            adherence_coefficients,
            history: self.history.clone(),
        }
    }
}

/// Holds one trained model set and serves predictions from it
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    recommender: RecommendationEngine,
    state: RwLock<Option<Arc<TrainedModelState>>>,
    training: Mutex<()>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            recommender: RecommendationEngine::with_config(config.recommendation.clone()),
            config,
            state: RwLock::new(None),
            training: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Simulate a history from `params` and train on it
    #[instrument(skip(self, params), fields(days = params.history_days))]
    pub fn simulate_train(&self, params: &SimulationParams) -> Result<TrainingReport> {
        let history = simulate_history(params)?;
        self.train_history(history)
    }

    /// Train on a user-supplied history
    #[instrument(skip(self, history), fields(records = history.len()))]
    pub fn train_custom(&self, history: History) -> Result<TrainingReport> {
        self.train_history(history)
    }

    /// Recommendation for today's input using the live model set
    pub fn predict(&self, input: &PredictionInput) -> Result<Recommendation> {
        let state = self.current().ok_or(HabitError::NotTrained)?;
        state.predict(input, &self.recommender)
    }

    pub fn is_trained(&self) -> bool {
        self.current().is_some()
    }

    /// Snapshot of the live model set
    pub fn current(&self) -> Option<Arc<TrainedModelState>> {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn train_history(&self, history: History) -> Result<TrainingReport> {
        let _serialized = self
            .training
            .lock()
            .map_err(|_| HabitError::Internal("training lock poisoned".to_string()))?;

        let fitted = Arc::new(TrainedModelState::fit(history, &self.config)?);
        let report = fitted.report();

        match self.state.write() {
            Ok(mut guard) => *guard = Some(fitted),
            Err(poisoned) => *poisoned.into_inner() = Some(fitted),
        }
        Ok(report)
    }
}
