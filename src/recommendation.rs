//! Rule-based recommendation engine
//!
//! Model outputs are mapped to a [`Recommendation`] by a decision table
//! consulted in order, first match wins. The table lives in configuration so
//! thresholds and wording can change without touching the models.
//!
//! | # | condition                                   | type       |
//! |---|---------------------------------------------|------------|
//! | 1 | burnout risk > 1.5                          | `warning`  |
//! | 2 | today's sleep < 3 h                         | `rest`     |
//! | 3 | burnout risk > 1.2 and adherence >= 0.7     | `rest`     |
//! | 4 | adherence < 0.4                             | `push`     |
//! | 5 | always                                      | `maintain` |

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adherence::FeatureContribution;
use crate::error::{HabitError, Result};
use crate::models::{History, PredictionInput, Recommendation, RecommendationType};

/// Thresholds a rule checks; unset fields always pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleCondition {
    /// Matches when the burnout risk score is strictly above this
    pub burnout_risk_above: Option<f64>,

    /// Matches when adherence probability is at least this
    pub adherence_at_least: Option<f64>,

    /// Matches when adherence probability is strictly below this
    pub adherence_below: Option<f64>,

    /// Matches when today's sleep is strictly below this many minutes
    pub sleep_minutes_below: Option<u32>,
}

impl RuleCondition {
    pub fn matches(&self, signals: &ModelSignals, input: &PredictionInput) -> bool {
        self.burnout_risk_above
            .map_or(true, |t| signals.burnout_risk_score > t)
            && self
                .adherence_at_least
                .map_or(true, |t| signals.adherence_probability >= t)
            && self
                .adherence_below
                .map_or(true, |t| signals.adherence_probability < t)
            && self
                .sleep_minutes_below
                .map_or(true, |t| input.sleep_minutes() < t)
    }

    pub fn is_catch_all(&self) -> bool {
        *self == RuleCondition::default()
    }

    /// Reasons citing the thresholds this condition crossed
    fn reasons(&self, signals: &ModelSignals, input: &PredictionInput) -> Vec<String> {
        let mut reasons = Vec::new();
        if let Some(threshold) = self.sleep_minutes_below {
            reasons.push(format!(
                "Severe sleep deprivation detected ({:.1} hours, under {:.1}).",
                input.sleep_minutes() as f64 / 60.0,
                threshold as f64 / 60.0
            ));
        }
        if let Some(threshold) = self.burnout_risk_above {
            reasons.push(format!(
                "Burnout risk score {:.2} is above {:.2} (baseline 1.00).",
                signals.burnout_risk_score, threshold
            ));
        }
        if self.adherence_at_least.is_some() {
            reasons.push(format!(
                "High adherence probability ({:.0}%), so intensity is the risk, not skipping.",
                signals.adherence_probability * 100.0
            ));
        }
        if self.adherence_below.is_some() {
            reasons.push(format!(
                "Low adherence probability ({:.0}%).",
                signals.adherence_probability * 100.0
            ));
        }
        reasons
    }
}

/// Condition selecting an alternate wording inside a template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantCondition {
    /// Consecutive days without exercise, counting today, of at least this
    pub min_consecutive_misses: Option<u32>,

    /// Adherence probability strictly below this
    pub adherence_below: Option<f64>,

    /// Adherence probability at most this
    pub adherence_at_most: Option<f64>,
}

/// Alternate title/body for a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateVariant {
    pub title: String,
    pub body: String,
    pub when: VariantCondition,
}

/// Message wording for one rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub title: String,
    pub body: String,
    pub suggested_action: String,

    /// Checked in order; the first match replaces title and body
    #[serde(default)]
    pub variants: Vec<TemplateVariant>,
}

/// One row of the decision table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub name: String,
    pub recommendation_type: RecommendationType,
    pub condition: RuleCondition,
    pub template: MessageTemplate,
}

/// Decision table plus the thresholds used when explaining a recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Trailing records used as the personal baseline
    pub baseline_window: usize,

    /// Relative step deviation from baseline worth mentioning
    pub steps_deviation: f64,

    /// Relative sleep deviation from baseline worth mentioning
    pub sleep_deviation: f64,

    /// Today's session this much above the usual session length is mentioned
    pub exercise_surge: f64,

    /// Driver contributions (in log-odds) smaller than this are not cited
    pub min_driver_contribution: f64,

    pub rules: Vec<PolicyRule>,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            baseline_window: 7,
            steps_deviation: 0.25,
            sleep_deviation: 0.15,
            exercise_surge: 0.5,
            min_driver_contribution: 0.1,
            rules: default_rules(),
        }
    }
}

impl RecommendationConfig {
    pub fn validate(&self) -> Result<()> {
        match self.rules.last() {
            None => {
                return Err(HabitError::Configuration(
                    "recommendation.rules must not be empty".to_string(),
                ))
            }
            Some(last) if !last.condition.is_catch_all() => {
                return Err(HabitError::Configuration(format!(
                    "last recommendation rule '{}' must have no conditions",
                    last.name
                )))
            }
            Some(_) => {}
        }
        if self.baseline_window == 0 {
            return Err(HabitError::Configuration(
                "recommendation.baseline_window must be at least one day".to_string(),
            ));
        }
        for rule in &self.rules {
            let c = &rule.condition;
            let in_unit = |v: Option<f64>| v.map_or(true, |v| (0.0..=1.0).contains(&v));
            if !in_unit(c.adherence_at_least) || !in_unit(c.adherence_below) {
                return Err(HabitError::Configuration(format!(
                    "rule '{}' has an adherence threshold outside [0, 1]",
                    rule.name
                )));
            }
            if c.burnout_risk_above.is_some_and(|v| !v.is_finite() || v < 0.0) {
                return Err(HabitError::Configuration(format!(
                    "rule '{}' has an invalid burnout threshold",
                    rule.name
                )));
            }
        }
        Ok(())
    }
}

fn template(title: &str, body: &str, action: &str) -> MessageTemplate {
    MessageTemplate {
        title: title.to_string(),
        body: body.to_string(),
        suggested_action: action.to_string(),
        variants: Vec::new(),
    }
}

fn variant(title: &str, body: &str, when: VariantCondition) -> TemplateVariant {
    TemplateVariant {
        title: title.to_string(),
        body: body.to_string(),
        when,
    }
}

/// The default decision table
pub fn default_rules() -> Vec<PolicyRule> {
    vec![
        PolicyRule {
            name: "high_burnout_risk".to_string(),
            recommendation_type: RecommendationType::Warning,
            condition: RuleCondition {
                burnout_risk_above: Some(1.5),
                ..RuleCondition::default()
            },
            template: template(
                "Burnout warning",
                "Your recent sleep and activity look like the run-up to a crash. Time to back off before it happens.",
                "Swap today's session for an easy walk and aim for an early night.",
            ),
        },
        PolicyRule {
            name: "severe_sleep_deprivation".to_string(),
            recommendation_type: RecommendationType::Rest,
            condition: RuleCondition {
                sleep_minutes_below: Some(180),
                ..RuleCondition::default()
            },
            template: template(
                "Sleep First, Train Later",
                "You got less than 3 hours of sleep. Training now is counter-productive.",
                "Skip the workout. Take a nap or go to bed early tonight.",
            ),
        },
        PolicyRule {
            name: "protect_energy".to_string(),
            recommendation_type: RecommendationType::Rest,
            condition: RuleCondition {
                burnout_risk_above: Some(1.2),
                adherence_at_least: Some(0.7),
                ..RuleCondition::default()
            },
            template: template(
                "Protect your energy",
                "You're showing up consistently, but the load is building faster than you recover.",
                "Do 50% of your planned duration today.",
            ),
        },
        PolicyRule {
            name: "low_adherence".to_string(),
            recommendation_type: RecommendationType::Push,
            condition: RuleCondition {
                adherence_below: Some(0.4),
                ..RuleCondition::default()
            },
            template: MessageTemplate {
                variants: vec![variant(
                    "Everything okay?",
                    "You've been away for a while. Missed days are just data points; today is a fine day to restart.",
                    VariantCondition {
                        min_consecutive_misses: Some(8),
                        ..VariantCondition::default()
                    },
                )],
                ..template(
                    "Don't break the chain",
                    "You missed a few days, but it happens. Getting back to it quickly keeps the habit strong.",
                    "Start small: just 5 minutes of movement to break the seal.",
                )
            },
        },
        PolicyRule {
            name: "maintain".to_string(),
            recommendation_type: RecommendationType::Maintain,
            condition: RuleCondition::default(),
            template: MessageTemplate {
                variants: vec![
                    variant(
                        "Time to Shift Gears",
                        "Momentum is waiting for you. Push a little harder today to get back on track.",
                        VariantCondition {
                            adherence_below: Some(0.5),
                            ..VariantCondition::default()
                        },
                    ),
                    variant(
                        "Good Work",
                        "You're doing well. Keep the momentum building.",
                        VariantCondition {
                            adherence_at_most: Some(0.7),
                            ..VariantCondition::default()
                        },
                    ),
                ],
                ..template(
                    "Keep It Up!",
                    "Excellent dedication. You're consistently showing up.",
                    "Complete your standard session.",
                )
            },
        },
    ]
}

/// Used when a custom table has no rule matching
fn catch_all_rule() -> PolicyRule {
    PolicyRule {
        name: "fallback".to_string(),
        recommendation_type: RecommendationType::Maintain,
        condition: RuleCondition::default(),
        template: template(
            "Keep going",
            "You're on track.",
            "Complete your standard session.",
        ),
    }
}

/// Model outputs consumed by the engine
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelSignals {
    pub adherence_probability: f64,
    pub burnout_risk_score: f64,

    /// Adherence feature contributions, largest magnitude first
    pub drivers: Vec<FeatureContribution>,
}

impl ModelSignals {
    pub fn new(adherence_probability: f64, burnout_risk_score: f64) -> Self {
        Self {
            adherence_probability,
            burnout_risk_score,
            drivers: Vec::new(),
        }
    }

    pub fn with_drivers(mut self, drivers: Vec<FeatureContribution>) -> Self {
        self.drivers = drivers;
        self
    }
}

/// Personal baseline over the trailing window of the history
#[derive(Debug, Clone, PartialEq)]
struct Baseline {
    days: usize,
    avg_steps: f64,
    avg_sleep_minutes: f64,
    active_days: usize,
    avg_session_minutes: f64,
}

impl Baseline {
    fn from_history(history: &History, window: usize) -> Option<Self> {
        let recent = history.trailing(window);
        if recent.is_empty() {
            return None;
        }
        let n = recent.len() as f64;
        let active: Vec<f64> = recent
            .iter()
            .filter(|r| r.exercise_done)
            .map(|r| r.exercise_minutes as f64)
            .collect();
        Some(Self {
            days: recent.len(),
            avg_steps: recent.iter().map(|r| r.total_steps as f64).sum::<f64>() / n,
            avg_sleep_minutes: recent
                .iter()
                .map(|r| r.sleep_duration_minutes as f64)
                .sum::<f64>()
                / n,
            active_days: active.len(),
            avg_session_minutes: if active.is_empty() {
                0.0
            } else {
                active.iter().sum::<f64>() / active.len() as f64
            },
        })
    }
}

fn relative_change(today: f64, baseline: f64) -> Option<f64> {
    (baseline > 0.0).then(|| (today - baseline) / baseline)
}

/// Translates model signals into a typed recommendation
#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine {
    config: RecommendationConfig,
}

impl RecommendationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RecommendationConfig) -> Self {
        Self { config }
    }

    /// First rule in the table whose condition holds
    pub fn select_rule(
        &self,
        signals: &ModelSignals,
        input: &PredictionInput,
    ) -> Option<&PolicyRule> {
        self.config
            .rules
            .iter()
            .find(|rule| rule.condition.matches(signals, input))
    }

    /// Build today's recommendation
    pub fn generate(
        &self,
        signals: &ModelSignals,
        input: &PredictionInput,
        history: &History,
    ) -> Recommendation {
        let fallback = catch_all_rule();
        let rule = self.select_rule(signals, input).unwrap_or(&fallback);

        let misses = consecutive_misses(history, input);
        let (title, body) = rule
            .template
            .variants
            .iter()
            .find(|v| {
                v.when.min_consecutive_misses.map_or(true, |m| misses >= m)
                    && v
                        .when
                        .adherence_below
                        .map_or(true, |t| signals.adherence_probability < t)
                    && v
                        .when
                        .adherence_at_most
                        .map_or(true, |t| signals.adherence_probability <= t)
            })
            .map_or((&rule.template.title, &rule.template.body), |v| (&v.title, &v.body));

        let mut reasons = rule.condition.reasons(signals, input);
        if rule.condition.is_catch_all() {
            reasons.push(adherence_tier_reason(signals.adherence_probability));
        }
        reasons.extend(self.baseline_reasons(input, history));
        if let Some(driver) = self.driver_reason(signals) {
            reasons.push(driver);
        }

        debug!(
            rule = %rule.name,
            recommendation = %rule.recommendation_type,
            reasons = reasons.len(),
            "Recommendation selected"
        );

        Recommendation {
            recommendation_type: rule.recommendation_type,
            message_title: title.clone(),
            message_body: body.clone(),
            suggested_action: rule.template.suggested_action.clone(),
            adherence_probability: signals.adherence_probability,
            burnout_risk_score: signals.burnout_risk_score,
            why_this_recommendation: reasons,
        }
    }

    /// Compare today against the trailing baseline and cite notable gaps
    fn baseline_reasons(&self, input: &PredictionInput, history: &History) -> Vec<String> {
        let Some(baseline) = Baseline::from_history(history, self.config.baseline_window) else {
            return Vec::new();
        };
        let mut reasons = Vec::new();
        let label = format!("{}-day average", baseline.days);

        if let Some(change) = relative_change(input.steps as f64, baseline.avg_steps) {
            if change.abs() >= self.config.steps_deviation {
                reasons.push(format!(
                    "Steps {:.0}% {} your {}.",
                    change.abs() * 100.0,
                    if change < 0.0 { "below" } else { "above" },
                    label
                ));
            }
        }

        let today_sleep = input.sleep_minutes() as f64;
        if let Some(change) = relative_change(today_sleep, baseline.avg_sleep_minutes) {
            if change.abs() >= self.config.sleep_deviation {
                reasons.push(format!(
                    "Sleep {:.0}% {} your {}.",
                    change.abs() * 100.0,
                    if change < 0.0 { "below" } else { "above" },
                    label
                ));
            }
        }

        if input.exercise_minutes == 0 && baseline.active_days > 0 {
            reasons.push(format!(
                "No exercise today; you were active on {} of the last {} days.",
                baseline.active_days, baseline.days
            ));
        } else if let Some(change) =
            relative_change(input.exercise_minutes as f64, baseline.avg_session_minutes)
        {
            if input.exercise_minutes > 0 && change >= self.config.exercise_surge {
                reasons.push(format!(
                    "Exercise {:.0}% longer than your usual session.",
                    change * 100.0
                ));
            }
        }

        reasons
    }

    fn driver_reason(&self, signals: &ModelSignals) -> Option<String> {
        let driver = signals
            .drivers
            .iter()
            .find(|d| d.contribution.abs() >= self.config.min_driver_contribution)?;
        Some(format!(
            "Biggest adherence driver: {} ({} tomorrow's odds).",
            driver.feature.replace('_', " "),
            if driver.contribution > 0.0 { "raises" } else { "lowers" }
        ))
    }
}

fn adherence_tier_reason(probability: f64) -> String {
    let pct = probability * 100.0;
    if probability < 0.5 {
        format!("Adherence probability is borderline ({:.0}%).", pct)
    } else if probability <= 0.7 {
        format!("Stable adherence probability ({:.0}%).", pct)
    } else {
        format!("High adherence probability ({:.0}%).", pct)
    }
}

/// Days without exercise ending today, counting today's input
fn consecutive_misses(history: &History, input: &PredictionInput) -> u32 {
    if input.exercise_minutes > 0 {
        return 0;
    }
    1 + history
        .records()
        .iter()
        .rev()
        .take_while(|r| !r.exercise_done)
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DailyRecord;
    use chrono::{Duration, NaiveDate};

    fn steady_history(days: usize, exercise_minutes: u32) -> History {
        let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let records = (0..days)
            .map(|i| {
                let date = start + Duration::days(i as i64);
                DailyRecord::new(date, 8000, 450, exercise_minutes)
            })
            .collect();
        History::new(records).unwrap()
    }

    fn typical_input() -> PredictionInput {
        PredictionInput::new(8000, 7.5, 30).unwrap()
    }

    fn recommend(adherence: f64, risk: f64) -> Recommendation {
        RecommendationEngine::new().generate(
            &ModelSignals::new(adherence, risk),
            &typical_input(),
            &steady_history(14, 30),
        )
    }

    #[test]
    fn test_warning_branch() {
        let rec = recommend(0.9, 1.8);
        assert_eq!(rec.recommendation_type, RecommendationType::Warning);
        assert!(rec.why_this_recommendation[0].contains("1.80"));

        assert_eq!(recommend(0.2, 1.8).recommendation_type, RecommendationType::Warning);
    }

    #[test]
    fn test_rest_branch() {
        let rec = recommend(0.9, 1.3);
        assert_eq!(rec.recommendation_type, RecommendationType::Rest);
        assert_eq!(rec.suggested_action, "Do 50% of your planned duration today.");
    }

    #[test]
    fn test_push_branch() {
        let rec = recommend(0.2, 1.0);
        assert_eq!(rec.recommendation_type, RecommendationType::Push);
        assert_eq!(rec.message_title, "Don't break the chain");
    }

    #[test]
    fn test_maintain_branch() {
        for (adherence, risk) in [(0.6, 1.0), (0.5, 1.3), (0.95, 0.4)] {
            assert_eq!(
                recommend(adherence, risk).recommendation_type,
                RecommendationType::Maintain
            );
        }
        assert_eq!(recommend(0.45, 1.0).message_title, "Time to Shift Gears");
        assert_eq!(recommend(0.6, 1.0).message_title, "Good Work");
        assert_eq!(recommend(0.9, 1.0).message_title, "Keep It Up!");
    }

    #[test]
    fn test_severe_sleep_overrides_adherence() {
        let input = PredictionInput::new(8000, 2.5, 0).unwrap();
        let rec = RecommendationEngine::new().generate(
            &ModelSignals::new(0.2, 1.0),
            &input,
            &steady_history(14, 30),
        );
        assert_eq!(rec.recommendation_type, RecommendationType::Rest);
        assert!(rec.why_this_recommendation[0].contains("2.5 hours"));
    }

    #[test]
    fn test_long_absence_variant() {
        let input = PredictionInput::new(3000, 7.5, 0).unwrap();
        let rec = RecommendationEngine::new().generate(
            &ModelSignals::new(0.1, 1.0),
            &input,
            &steady_history(14, 0),
        );
        assert_eq!(rec.recommendation_type, RecommendationType::Push);
        assert_eq!(rec.message_title, "Everything okay?");
    }

    #[test]
    fn test_baseline_reasons() {
        let input = PredictionInput::new(4000, 4.5, 0).unwrap();
        let rec = RecommendationEngine::new().generate(
            &ModelSignals::new(0.6, 1.0),
            &input,
            &steady_history(14, 30),
        );
        let reasons = rec.why_this_recommendation.join("\n");

        assert!(reasons.contains("Steps 50% below your 7-day average."));
        assert!(reasons.contains("Sleep 40% below your 7-day average."));
        assert!(reasons.contains("active on 7 of the last 7 days"));
    }

    #[test]
    fn test_no_baseline_reasons_on_typical_day() {
        let rec = recommend(0.6, 1.0);
        assert_eq!(rec.why_this_recommendation.len(), 1);
    }

    #[test]
    fn test_driver_reason() {
        let signals = ModelSignals::new(0.6, 1.0).with_drivers(vec![FeatureContribution {
            feature: "current_streak".to_string(),
            contribution: 0.8,
        }]);
        let rec = RecommendationEngine::new().generate(
            &signals,
            &typical_input(),
            &steady_history(14, 30),
        );
        assert_eq!(
            rec.why_this_recommendation.last().unwrap(),
            "Biggest adherence driver: current streak (raises tomorrow's odds)."
        );
    }

    #[test]
    fn test_custom_table_is_consulted() {
        let mut config = RecommendationConfig::default();
        config.rules.insert(
            0,
            PolicyRule {
                name: "always_push".to_string(),
                recommendation_type: RecommendationType::Push,
                condition: RuleCondition {
                    adherence_at_least: Some(0.0),
                    ..RuleCondition::default()
                },
                template: template("Go", "Go now.", "Move."),
            },
        );
        assert!(config.validate().is_ok());

        let rec = RecommendationEngine::with_config(config).generate(
            &ModelSignals::new(0.9, 1.8),
            &typical_input(),
            &steady_history(14, 30),
        );
        assert_eq!(rec.recommendation_type, RecommendationType::Push);
    }

    #[test]
    fn test_table_without_catch_all_rejected() {
        let mut config = RecommendationConfig::default();
        config.rules.pop();
        assert!(config.validate().is_err());
    }
}
