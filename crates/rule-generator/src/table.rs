//! FPR/threshold table reduction

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// One point of a trained model's evaluation curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricDataPoint {
    pub fpr: f64,
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpr: Option<f64>,
}

impl MetricDataPoint {
    pub fn new(fpr: f64, threshold: f64) -> Self {
        Self {
            fpr,
            threshold,
            precision: None,
            tpr: None,
        }
    }
}

/// Round to hundredths, ties to even
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}

/// FPR in whole hundredths, so band boundaries compare exactly
fn hundredths(x: f64) -> i64 {
    (x * 100.0).round_ties_even() as i64
}

/// One representative threshold per distinct rounded FPR
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FprBand {
    /// FPR in hundredths
    pub fpr_pct: i64,
    /// Rounded threshold
    pub threshold: f64,
    /// Threshold of the preceding band, if any
    pub threshold_prev: Option<f64>,
}

impl FprBand {
    pub fn fpr(&self) -> f64 {
        self.fpr_pct as f64 / 100.0
    }
}

/// Collapse the table to one band per rounded FPR, ordered by ascending FPR
///
/// Within a band the highest rounded threshold is kept; on ties the earliest
/// row wins. Rows with a non-finite FPR or threshold are skipped.
pub fn reduce_bands(points: &[MetricDataPoint]) -> Vec<FprBand> {
    let mut best: BTreeMap<i64, f64> = BTreeMap::new();

    for point in points {
        if !point.fpr.is_finite() || !point.threshold.is_finite() {
            debug!("Skipping non-finite metric point {:?}", point);
            continue;
        }
        let threshold = round2(point.threshold);
        best.entry(hundredths(point.fpr))
            .and_modify(|current| {
                if threshold > *current {
                    *current = threshold;
                }
            })
            .or_insert(threshold);
    }

    let mut prev = None;
    best.into_iter()
        .map(|(fpr_pct, threshold)| {
            let band = FprBand {
                fpr_pct,
                threshold,
                threshold_prev: prev,
            };
            prev = Some(threshold);
            band
        })
        .collect()
}
