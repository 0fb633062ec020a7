// Library interface for HabitRS modules
// The binary and the integration tests both go through these exports

pub mod adherence;
pub mod burnout;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod features;
pub mod import;
pub mod logging;
pub mod models;
pub mod recommendation;
pub mod simulator;

// Re-export commonly used types for convenience
pub use models::*;
pub use adherence::{AdherenceConfig, AdherenceModel, FeatureContribution};
pub use burnout::{concordance_index, BurnoutConfig, BurnoutModel, SurvivalTime};
pub use config::EngineConfig;
pub use engine::{Engine, TrainedModelState};
pub use error::{HabitError, Result};
pub use features::{FeatureBuilder, FeatureConfig, FeatureRow, FeatureScaler};
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
pub use recommendation::{ModelSignals, RecommendationConfig, RecommendationEngine};
pub use simulator::{simulate_history, HistorySimulator};
