use chrono::{Duration, NaiveDate};
use habitrs::export::write_history;
use habitrs::import::read_history;
use habitrs::{
    DailyRecord, Engine, EngineConfig, HabitError, History, PredictionInput, RecommendationType,
    SimulationParams,
};
use proptest::prelude::*;
use tempfile::tempdir;

/// Integration tests that drive the engine end to end

#[cfg(test)]
mod integration_tests {
    use super::*;

    fn params(days: i64, seed: u64) -> SimulationParams {
        SimulationParams {
            history_days: days,
            seed: Some(seed),
            end_date: NaiveDate::from_ymd_opt(2024, 9, 30),
            ..SimulationParams::default()
        }
    }

    /// Eight days of slowly slipping habits followed by a four-day collapse, repeated
    fn cyclic_history(cycles: usize) -> History {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut records = Vec::new();
        for cycle in 0..cycles {
            for d in 0..12u32 {
                let offset = (cycle * 12) as i64 + d as i64;
                let date = start + Duration::days(offset);
                records.push(if d < 8 {
                    let exercise = if d % 2 == 0 { 40 } else { 0 };
                    DailyRecord::new(date, 10000 - d * 400, 500 - d * 10, exercise)
                } else {
                    DailyRecord::new(date, 2500, 300, 0)
                });
            }
        }
        History::new(records).unwrap()
    }

    #[test]
    fn test_simulate_train_and_predict_workflow() {
        let engine = Engine::default();
        let report = engine.simulate_train(&params(90, 42)).unwrap();

        assert_eq!(report.history_points, 90);
        assert_eq!(report.history.records().len(), 90);
        for record in report.history.records() {
            assert_eq!(record.exercise_done, record.exercise_minutes > 0);
        }

        let recommendation = engine
            .predict(&PredictionInput::new(8000, 7.5, 30).unwrap())
            .unwrap();
        assert!((0.0..=1.0).contains(&recommendation.adherence_probability));
        assert!(recommendation.burnout_risk_score >= 0.0);
        assert!(!recommendation.message_title.is_empty());
        assert!(!recommendation.suggested_action.is_empty());
    }

    #[test]
    fn test_same_seed_reproduces_metrics() {
        let first = Engine::default().simulate_train(&params(120, 9)).unwrap();
        let second = Engine::default().simulate_train(&params(120, 9)).unwrap();

        assert_eq!(first.history_points, second.history_points);
        assert_eq!(first.adherence_accuracy, second.adherence_accuracy);
        assert_eq!(first.burnout_c_index, second.burnout_c_index);
        assert_eq!(first.history, second.history);
    }

    #[test]
    fn test_predict_requires_training() {
        let engine = Engine::default();
        let result = engine.predict(&PredictionInput::new(5000, 6.0, 0).unwrap());
        assert!(matches!(result, Err(HabitError::NotTrained)));
    }

    #[test]
    fn test_train_custom_rejects_short_history() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let records = (0..13)
            .map(|i| DailyRecord::new(start + Duration::days(i), 7000, 420, 20))
            .collect();

        let result = Engine::default().train_custom(History::new(records).unwrap());
        assert!(matches!(
            result,
            Err(HabitError::DataInsufficient { required: 14, actual: 13, .. })
        ));
    }

    #[test]
    fn test_invalid_simulation_params_rejected() {
        let result = Engine::default().simulate_train(&SimulationParams {
            history_days: -10,
            ..params(1, 1)
        });
        assert!(matches!(result, Err(HabitError::Validation(_))));
    }

    #[test]
    fn test_history_without_burnout_still_trains() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let records = (0..40)
            .map(|i| {
                DailyRecord::new(
                    start + Duration::days(i),
                    11000,
                    480,
                    if i % 3 == 0 { 0 } else { 45 },
                )
            })
            .collect();
        let engine = Engine::default();
        let report = engine.train_custom(History::new(records).unwrap()).unwrap();

        assert_eq!(report.burnout_events_observed, 0);
        assert_eq!(report.burnout_c_index, 0.5);

        let recommendation = engine
            .predict(&PredictionInput::new(11000, 8.0, 45).unwrap())
            .unwrap();
        assert!((recommendation.burnout_risk_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_history_learns_burnout_pattern() {
        let engine = Engine::default();
        let report = engine.train_custom(cyclic_history(6)).unwrap();

        assert!(report.burnout_events_observed > 0);
        assert!(report.burnout_c_index > 0.6);

        let recommendation = engine
            .predict(&PredictionInput::new(2500, 5.0, 0).unwrap())
            .unwrap();
        assert!(recommendation.burnout_risk_score.is_finite());
        assert!(!recommendation.why_this_recommendation.is_empty());
    }

    #[test]
    fn test_file_history_trains_like_in_memory_history() {
        let dir = tempdir().unwrap();
        let history = cyclic_history(3);

        let path = dir.path().join("history.csv");
        write_history(&path, &history).unwrap();
        let loaded = read_history(&path).unwrap();
        assert_eq!(loaded, history);

        let from_file = Engine::default().train_custom(loaded).unwrap();
        let in_memory = Engine::default().train_custom(history).unwrap();
        assert_eq!(from_file.adherence_accuracy, in_memory.adherence_accuracy);
        assert_eq!(from_file.burnout_c_index, in_memory.burnout_c_index);
    }

    #[test]
    fn test_report_serializes_history_fields() {
        let report = Engine::default().simulate_train(&params(30, 4)).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        let first = &json["history"][0];
        for field in [
            "date",
            "total_steps",
            "sleep_duration_minutes",
            "exercise_minutes",
            "exercise_done",
        ] {
            assert!(first.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["history_points"], 30);
    }

    #[test]
    fn test_config_thresholds_change_recommendation() {
        let mut config = EngineConfig::default();
        for rule in &mut config.recommendation.rules {
            if rule.recommendation_type == RecommendationType::Warning {
                rule.condition.burnout_risk_above = Some(0.0);
            }
        }
        let engine = Engine::new(config);
        engine.simulate_train(&params(60, 3)).unwrap();

        let recommendation = engine
            .predict(&PredictionInput::new(8000, 7.5, 30).unwrap())
            .unwrap();
        assert_eq!(recommendation.recommendation_type, RecommendationType::Warning);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn test_outputs_stay_in_range(
            seed in any::<u64>(),
            steps in 0u32..30000,
            sleep_hours in 0.0f64..14.0,
            exercise_minutes in 0u32..180,
        ) {
            let engine = Engine::default();
            engine.simulate_train(&params(45, seed)).unwrap();
            let recommendation = engine
                .predict(&PredictionInput::new(steps, sleep_hours, exercise_minutes).unwrap())
                .unwrap();

            prop_assert!((0.0..=1.0).contains(&recommendation.adherence_probability));
            prop_assert!(recommendation.burnout_risk_score >= 0.0);
            prop_assert!(recommendation.burnout_risk_score.is_finite());
        }
    }
}
