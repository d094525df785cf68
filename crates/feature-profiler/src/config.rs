//! Profiler configuration

use serde::{Deserialize, Serialize};

/// Which statistic the "likely categorical" warning compares against its threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LikelyCategoricalBasis {
    /// Raw distinct count (historical behaviour, only fires for all-null columns)
    UniqueCount,
    /// Distinct count as a fraction of rows
    UniquePct,
}

/// Thresholds and name patterns used to classify columns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Case-insensitive pattern marking IP address columns
    pub ip_pattern: String,
    /// Case-insensitive pattern marking email address columns
    pub email_pattern: String,
    /// Category columns above this unique ratio are flagged for exclusion
    pub high_cardinality_pct: f64,
    /// Null ratio above which a null warning is raised
    pub null_warning_pct: f64,
    /// Null ratio above which the column is flagged for exclusion
    pub high_null_pct: f64,
    /// Numeric columns below this are flagged as likely categorical
    pub likely_categorical_threshold: f64,
    pub likely_categorical_basis: LikelyCategoricalBasis,
    /// Drop columns carrying an exclusion warning from the model variables
    pub apply_exclusions: bool,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            ip_pattern: r"(^|_)ip($|_)|ip_?addr(ess)?".to_string(),
            email_pattern: r"e_?mail".to_string(),
            high_cardinality_pct: 0.9,
            null_warning_pct: 0.2,
            high_null_pct: 0.5,
            likely_categorical_threshold: 0.2,
            likely_categorical_basis: LikelyCategoricalBasis::UniqueCount,
            apply_exclusions: false,
        }
    }
}

impl ProfilerConfig {
    /// Strict config: exclusion warnings remove columns from the model
    pub fn strict() -> Self {
        Self {
            likely_categorical_basis: LikelyCategoricalBasis::UniquePct,
            apply_exclusions: true,
            ..Default::default()
        }
    }
}
