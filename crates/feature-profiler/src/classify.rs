//! Column classification
//!
//! Feature types and warnings are assigned by ordered rule chains: every rule
//! is evaluated in a fixed order and the last one that matches wins.

use crate::config::{LikelyCategoricalBasis, ProfilerConfig};
use crate::dataset::{Dtype, EVENT_LABEL, EVENT_TIMESTAMP};
use crate::error::ProfileError;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Semantic type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    Numeric,
    Category,
    IpAddress,
    EmailAddress,
    Target,
    EventTimestamp,
    Unknown,
}

impl FeatureType {
    /// Whether columns of this type may be used as model inputs
    pub fn is_model_input(self) -> bool {
        matches!(
            self,
            FeatureType::IpAddress
                | FeatureType::EmailAddress
                | FeatureType::Category
                | FeatureType::Numeric
        )
    }
}

/// Data-quality warning attached to a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureWarning {
    NoWarning,
    LabelNonBinary,
    ExcludeHighCardinality,
    NullWarning,
    ExcludeHighNull,
    LikelyCategorical,
}

impl FeatureWarning {
    /// Human readable explanation
    pub fn description(self) -> &'static str {
        match self {
            FeatureWarning::NoWarning => "NO WARNING",
            FeatureWarning::LabelNonBinary => "LABEL WARNING, NON-BINARY EVENT LABEL",
            FeatureWarning::ExcludeHighCardinality => "EXCLUDE, GT 90% UNIQUE",
            FeatureWarning::NullWarning => "NULL WARNING, GT 20% MISSING",
            FeatureWarning::ExcludeHighNull => "EXCLUDE, GT 50% MISSING",
            FeatureWarning::LikelyCategorical => "LIKELY CATEGORICAL, NUMERIC w. LOW CARDINALITY",
        }
    }

    /// Whether the warning recommends dropping the column
    pub fn is_exclusion(self) -> bool {
        matches!(
            self,
            FeatureWarning::ExcludeHighCardinality | FeatureWarning::ExcludeHighNull
        )
    }
}

/// Everything classification is allowed to look at
#[derive(Debug, Clone, Copy)]
pub struct ColumnFacts<'a> {
    pub name: &'a str,
    pub dtype: Dtype,
    pub null_pct: f64,
    pub unique_pct: f64,
    pub unique_count: usize,
}

/// Last matching rule wins; `default` when nothing matches
fn last_match<T: Copy>(default: T, chain: &[(bool, T)]) -> T {
    chain
        .iter()
        .rev()
        .find(|(matched, _)| *matched)
        .map(|(_, value)| *value)
        .unwrap_or(default)
}

/// Compiled classification rules
#[derive(Debug, Clone)]
pub struct Classifier {
    ip_pattern: Regex,
    email_pattern: Regex,
    config: ProfilerConfig,
}

impl Classifier {
    /// Compile the name patterns of a profiler config
    pub fn new(config: &ProfilerConfig) -> Result<Self, ProfileError> {
        let compile = |field: &'static str, pattern: &str| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| ProfileError::InvalidPattern { field, source })
        };

        Ok(Self {
            ip_pattern: compile("ip", &config.ip_pattern)?,
            email_pattern: compile("email", &config.email_pattern)?,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Assign the semantic type of a column
    pub fn feature_type(&self, facts: &ColumnFacts<'_>) -> FeatureType {
        last_match(
            FeatureType::Unknown,
            &[
                (facts.dtype.is_text(), FeatureType::Category),
                (facts.dtype.is_numeric(), FeatureType::Numeric),
                (self.ip_pattern.is_match(facts.name), FeatureType::IpAddress),
                (self.email_pattern.is_match(facts.name), FeatureType::EmailAddress),
                (facts.name == EVENT_LABEL, FeatureType::Target),
                (facts.name == EVENT_TIMESTAMP, FeatureType::EventTimestamp),
            ],
        )
    }

    /// Assign the data-quality warning of a column of the given type
    pub fn feature_warning(&self, facts: &ColumnFacts<'_>, feature_type: FeatureType) -> FeatureWarning {
        let cfg = &self.config;
        let low_cardinality = match cfg.likely_categorical_basis {
            LikelyCategoricalBasis::UniqueCount => {
                (facts.unique_count as f64) < cfg.likely_categorical_threshold
            }
            LikelyCategoricalBasis::UniquePct => facts.unique_pct < cfg.likely_categorical_threshold,
        };

        last_match(
            FeatureWarning::NoWarning,
            &[
                (
                    facts.name == EVENT_LABEL && facts.unique_count != 2,
                    FeatureWarning::LabelNonBinary,
                ),
                (
                    feature_type == FeatureType::Category
                        && facts.unique_pct > cfg.high_cardinality_pct,
                    FeatureWarning::ExcludeHighCardinality,
                ),
                (
                    facts.null_pct > cfg.null_warning_pct && facts.null_pct <= cfg.high_null_pct,
                    FeatureWarning::NullWarning,
                ),
                (facts.null_pct > cfg.high_null_pct, FeatureWarning::ExcludeHighNull),
                (
                    facts.dtype.is_numeric() && low_cardinality,
                    FeatureWarning::LikelyCategorical,
                ),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(name: &str, dtype: Dtype) -> ColumnFacts<'_> {
        ColumnFacts {
            name,
            dtype,
            null_pct: 0.0,
            unique_pct: 0.5,
            unique_count: 50,
        }
    }

    fn classifier() -> Classifier {
        Classifier::new(&ProfilerConfig::default()).unwrap()
    }

    #[test]
    fn test_dtype_based_types() {
        let c = classifier();
        assert_eq!(c.feature_type(&facts("merchant", Dtype::Text)), FeatureType::Category);
        assert_eq!(c.feature_type(&facts("amount", Dtype::Float)), FeatureType::Numeric);
        assert_eq!(c.feature_type(&facts("count", Dtype::Integer)), FeatureType::Numeric);
        assert_eq!(c.feature_type(&facts("is_new", Dtype::Boolean)), FeatureType::Unknown);
        assert_eq!(c.feature_type(&facts("signup", Dtype::Timestamp)), FeatureType::Unknown);
    }

    #[test]
    fn test_name_patterns_override_dtype() {
        let c = classifier();
        assert_eq!(c.feature_type(&facts("user_ip", Dtype::Text)), FeatureType::IpAddress);
        assert_eq!(c.feature_type(&facts("ip_address", Dtype::Text)), FeatureType::IpAddress);
        assert_eq!(c.feature_type(&facts("ipaddr", Dtype::Text)), FeatureType::IpAddress);
        assert_eq!(c.feature_type(&facts("customer_email", Dtype::Text)), FeatureType::EmailAddress);
        assert_eq!(c.feature_type(&facts("EMAIL_ADDRESS", Dtype::Text)), FeatureType::EmailAddress);
        // "zip" and "shipping" only contain the letters
        assert_eq!(c.feature_type(&facts("zip", Dtype::Integer)), FeatureType::Numeric);
        assert_eq!(c.feature_type(&facts("shipping", Dtype::Text)), FeatureType::Category);
    }

    #[test]
    fn test_reserved_names_win() {
        let c = classifier();
        assert_eq!(c.feature_type(&facts(EVENT_LABEL, Dtype::Text)), FeatureType::Target);
        assert_eq!(
            c.feature_type(&facts(EVENT_TIMESTAMP, Dtype::Text)),
            FeatureType::EventTimestamp
        );
    }

    #[test]
    fn test_high_null_beats_everything_before_it() {
        let c = classifier();
        let f = ColumnFacts {
            null_pct: 0.6,
            unique_pct: 0.95,
            ..facts("merchant", Dtype::Text)
        };
        assert_eq!(c.feature_warning(&f, FeatureType::Category), FeatureWarning::ExcludeHighNull);
    }

    #[test]
    fn test_null_warning_band() {
        let c = classifier();
        let at = |null_pct| {
            let f = ColumnFacts {
                null_pct,
                ..facts("merchant", Dtype::Text)
            };
            c.feature_warning(&f, FeatureType::Category)
        };
        assert_eq!(at(0.2), FeatureWarning::NoWarning);
        assert_eq!(at(0.21), FeatureWarning::NullWarning);
        assert_eq!(at(0.5), FeatureWarning::NullWarning);
        assert_eq!(at(0.51), FeatureWarning::ExcludeHighNull);
    }

    #[test]
    fn test_high_cardinality_only_for_category() {
        let c = classifier();
        let f = ColumnFacts {
            unique_pct: 0.95,
            ..facts("merchant", Dtype::Text)
        };
        assert_eq!(
            c.feature_warning(&f, FeatureType::Category),
            FeatureWarning::ExcludeHighCardinality
        );
        assert_eq!(c.feature_warning(&f, FeatureType::IpAddress), FeatureWarning::NoWarning);
    }

    #[test]
    fn test_label_cardinality() {
        let c = classifier();
        let f = ColumnFacts {
            unique_count: 3,
            ..facts(EVENT_LABEL, Dtype::Text)
        };
        assert_eq!(c.feature_warning(&f, FeatureType::Target), FeatureWarning::LabelNonBinary);

        let f = ColumnFacts {
            unique_count: 2,
            ..facts(EVENT_LABEL, Dtype::Text)
        };
        assert_eq!(c.feature_warning(&f, FeatureType::Target), FeatureWarning::NoWarning);
    }

    #[test]
    fn test_likely_categorical_compares_raw_count() {
        let c = classifier();
        let sparse = ColumnFacts {
            unique_pct: 0.01,
            unique_count: 1,
            ..facts("amount", Dtype::Float)
        };
        assert_eq!(c.feature_warning(&sparse, FeatureType::Numeric), FeatureWarning::NoWarning);

        let all_null = ColumnFacts {
            null_pct: 1.0,
            unique_pct: 0.0,
            unique_count: 0,
            ..facts("amount", Dtype::Float)
        };
        assert_eq!(
            c.feature_warning(&all_null, FeatureType::Numeric),
            FeatureWarning::LikelyCategorical
        );
    }

    #[test]
    fn test_likely_categorical_by_ratio() {
        let c = Classifier::new(&ProfilerConfig::strict()).unwrap();
        let f = ColumnFacts {
            unique_pct: 0.01,
            unique_count: 1,
            ..facts("amount", Dtype::Float)
        };
        assert_eq!(c.feature_warning(&f, FeatureType::Numeric), FeatureWarning::LikelyCategorical);
    }

    #[test]
    fn test_invalid_pattern() {
        let config = ProfilerConfig {
            ip_pattern: "(".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            Classifier::new(&config),
            Err(ProfileError::InvalidPattern { field: "ip", .. })
        ));
    }
}
