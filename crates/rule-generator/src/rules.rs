//! Rule synthesis from FPR bands

use crate::outcome::Outcome;
use crate::table::{reduce_bands, FprBand, MetricDataPoint};
use crate::RuleError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// FPR band boundaries, in hundredths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleGeneratorConfig {
    /// Bands at or below this are sent to review
    pub review_max_pct: i64,
    /// Bands at or below this (and above review) require verification
    pub verify_max_pct: i64,
    /// Single band above verification that approves below the previous threshold
    pub approve_band_pct: i64,
}

impl Default for RuleGeneratorConfig {
    fn default() -> Self {
        Self {
            review_max_pct: 3,
            verify_max_pct: 5,
            approve_band_pct: 6,
        }
    }
}

/// A rule ready to be registered on a detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedRule {
    pub rule_id: String,
    /// Empty when the band has no usable threshold
    pub expression: String,
    pub outcome: Outcome,
}

impl GeneratedRule {
    pub fn has_expression(&self) -> bool {
        !self.expression.is_empty()
    }
}

/// Render a threshold the way the metric table prints it
fn format_threshold(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Generates detector rules from a model's FPR/threshold table
pub struct RuleGenerator {
    config: RuleGeneratorConfig,
}

impl RuleGenerator {
    pub fn new(config: RuleGeneratorConfig) -> Self {
        Self { config }
    }

    /// Score variable the detector exposes for a model
    fn score_variable(model_id: &str) -> String {
        format!("${}_insightscore", model_id)
    }

    /// Expression for a band; empty outside the rule bands
    pub fn expression(&self, model_id: &str, band: &FprBand) -> String {
        let score = Self::score_variable(model_id);
        if band.fpr_pct <= self.config.verify_max_pct {
            format!("{} > {}", score, format_threshold(band.threshold))
        } else if band.fpr_pct == self.config.approve_band_pct {
            band.threshold_prev
                .map(|prev| format!("{} <= {}", score, format_threshold(prev)))
                .unwrap_or_default()
        } else {
            String::new()
        }
    }

    /// Outcome for a band
    pub fn outcome(&self, band: &FprBand) -> Outcome {
        if band.fpr_pct <= self.config.review_max_pct {
            Outcome::Review
        } else if band.fpr_pct <= self.config.verify_max_pct {
            Outcome::VerifyCustomer
        } else {
            Outcome::Approve
        }
    }

    /// Generate the ordered rule list for a model
    pub fn generate(
        &self,
        points: &[MetricDataPoint],
        model_id: &str,
    ) -> Result<Vec<GeneratedRule>, RuleError> {
        if model_id.trim().is_empty() {
            return Err(RuleError::EmptyModelId);
        }

        let rules: Vec<GeneratedRule> = reduce_bands(points)
            .iter()
            .filter(|band| band.fpr_pct > 0 && band.fpr_pct <= self.config.approve_band_pct)
            .enumerate()
            .map(|(index, band)| {
                let rule = GeneratedRule {
                    rule_id: format!("rule{}_{}", index, model_id),
                    expression: self.expression(model_id, band),
                    outcome: self.outcome(band),
                };
                debug!(
                    "fpr={:.2} -> IF {} THEN {}",
                    band.fpr(),
                    rule.expression,
                    rule.outcome
                );
                rule
            })
            .collect();

        info!(
            "Generated {} rules for model {} from {} metric points",
            rules.len(),
            model_id,
            points.len()
        );
        Ok(rules)
    }
}

impl Default for RuleGenerator {
    fn default() -> Self {
        Self::new(RuleGeneratorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn points(rows: &[(f64, f64)]) -> Vec<MetricDataPoint> {
        rows.iter().map(|&(f, t)| MetricDataPoint::new(f, t)).collect()
    }

    #[test]
    fn test_duplicate_fpr_and_boundary_rule() {
        let rules = RuleGenerator::default()
            .generate(&points(&[(0.01, 0.9), (0.01, 0.8), (0.06, 0.5)]), "fraud_model")
            .unwrap();

        assert_eq!(
            rules,
            vec![
                GeneratedRule {
                    rule_id: "rule0_fraud_model".to_string(),
                    expression: "$fraud_model_insightscore > 0.9".to_string(),
                    outcome: Outcome::Review,
                },
                GeneratedRule {
                    rule_id: "rule1_fraud_model".to_string(),
                    expression: "$fraud_model_insightscore <= 0.9".to_string(),
                    outcome: Outcome::Approve,
                },
            ]
        );
    }

    #[test]
    fn test_outcome_bands() {
        let rules = RuleGenerator::default()
            .generate(
                &points(&[
                    (0.0, 0.99),
                    (0.02, 0.95),
                    (0.03, 0.9),
                    (0.04, 0.85),
                    (0.05, 0.8),
                    (0.06, 0.75),
                    (0.07, 0.7),
                ]),
                "m",
            )
            .unwrap();

        // zero and above-boundary bands are dropped; ids follow the filtered order
        let outcomes: Vec<(&str, Outcome)> = rules
            .iter()
            .map(|r| (r.rule_id.as_str(), r.outcome))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                ("rule0_m", Outcome::Review),
                ("rule1_m", Outcome::Review),
                ("rule2_m", Outcome::VerifyCustomer),
                ("rule3_m", Outcome::VerifyCustomer),
                ("rule4_m", Outcome::Approve),
            ]
        );
        assert_eq!(rules[4].expression, "$m_insightscore <= 0.8");
    }

    #[test]
    fn test_boundary_without_predecessor_has_no_expression() {
        let rules = RuleGenerator::default()
            .generate(&points(&[(0.06, 0.5), (0.1, 0.2)]), "m")
            .unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].outcome, Outcome::Approve);
        assert!(!rules[0].has_expression());
    }

    #[test]
    fn test_whole_threshold_formatting() {
        let rules = RuleGenerator::default()
            .generate(&points(&[(0.01, 1.0)]), "m")
            .unwrap();
        assert_eq!(rules[0].expression, "$m_insightscore > 1.0");
    }

    #[test]
    fn test_empty_model_id_rejected() {
        assert!(matches!(
            RuleGenerator::default().generate(&points(&[(0.01, 0.9)]), " "),
            Err(RuleError::EmptyModelId)
        ));
    }

    #[test]
    fn test_rule_json_shape() {
        let rule = GeneratedRule {
            rule_id: "rule0_m".to_string(),
            expression: "$m_insightscore > 0.9".to_string(),
            outcome: Outcome::VerifyCustomer,
        };
        assert_eq!(
            serde_json::to_value(&rule).unwrap(),
            serde_json::json!({
                "ruleId": "rule0_m",
                "expression": "$m_insightscore > 0.9",
                "outcome": "verify_customer"
            })
        );
    }

    proptest! {
        #[test]
        fn prop_generation_is_deterministic(
            rows in prop::collection::vec((0.0f64..0.2, 0.0f64..1.0), 0..40)
        ) {
            let table = points(&rows);
            let generator = RuleGenerator::default();
            let first = generator.generate(&table, "m").unwrap();
            let second = generator.generate(&table, "m").unwrap();
            prop_assert_eq!(&first, &second);
            for rule in &first {
                prop_assert!(rule.rule_id.ends_with("_m"));
            }
        }
    }
}
