//! Per-column summary statistics

use crate::classify::{Classifier, ColumnFacts, FeatureType, FeatureWarning};
use crate::dataset::{Column, Dtype};
use serde::{Deserialize, Serialize};

/// Ratios are reported with four decimals, and classified on the rounded value
fn round4(x: f64) -> f64 {
    (x * 10_000.0).round_ties_even() / 10_000.0
}

/// Statistics and classification of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub feature_name: String,
    pub dtype: Dtype,
    /// Non-null cells
    pub count: usize,
    pub unique_count: usize,
    pub null_count: usize,
    pub not_null_count: usize,
    pub null_pct: f64,
    pub unique_pct: f64,
    pub feature_type: FeatureType,
    pub feature_warning: FeatureWarning,
}

impl FeatureSummary {
    /// Summarize a column of a dataset with `row_count > 0` rows
    pub fn compute(column: &Column, row_count: usize, classifier: &Classifier) -> Self {
        let null_count = column.null_count();
        let not_null_count = row_count - null_count;
        let unique_count = column.unique_count();
        let null_pct = round4(null_count as f64 / row_count as f64);
        let unique_pct = round4(unique_count as f64 / row_count as f64);

        let facts = ColumnFacts {
            name: column.name(),
            dtype: column.dtype(),
            null_pct,
            unique_pct,
            unique_count,
        };
        let feature_type = classifier.feature_type(&facts);
        let feature_warning = classifier.feature_warning(&facts, feature_type);

        Self {
            feature_name: column.name().to_string(),
            dtype: column.dtype(),
            count: not_null_count,
            unique_count,
            null_count,
            not_null_count,
            null_pct,
            unique_pct,
            feature_type,
            feature_warning,
        }
    }
}
