//! Feature Profiler
//!
//! Computes per-column statistics for a fraud training dataset, classifies
//! every column into a semantic feature type, flags data-quality warnings and
//! derives the model-input schema with its binary label mapping.

mod classify;
mod config;
mod dataset;
mod error;
mod schema;
mod summary;

pub use classify::{Classifier, ColumnFacts, FeatureType, FeatureWarning};
pub use config::{LikelyCategoricalBasis, ProfilerConfig};
pub use dataset::{Column, Dataset, Dtype, Value, EVENT_LABEL, EVENT_TIMESTAMP};
pub use error::ProfileError;
pub use schema::{label_counts, label_mapping, LabelMapper, LabelSchema, TrainingDataSchema};
pub use summary::FeatureSummary;

use serde::Serialize;
use tracing::{debug, info, warn};

/// Complete profiling output for one dataset snapshot
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub summaries: Vec<FeatureSummary>,
    pub schema: TrainingDataSchema,
    /// Columns accepted as model inputs
    pub model_variables: Vec<String>,
    /// All columns except the reserved label and timestamp
    pub event_variables: Vec<String>,
    /// Distinct label values in order of first appearance
    pub event_labels: Vec<String>,
}

/// Dataset profiler
pub struct Profiler {
    classifier: Classifier,
}

impl Profiler {
    /// Create a profiler with the given config
    pub fn new(config: &ProfilerConfig) -> Result<Self, ProfileError> {
        Ok(Self {
            classifier: Classifier::new(config)?,
        })
    }

    /// Summarize and classify every column
    ///
    /// A label with other than two distinct values is reported as a warning
    /// here; [`Profiler::profile`] rejects it.
    pub fn summarize(&self, dataset: &Dataset) -> Result<Vec<FeatureSummary>, ProfileError> {
        if dataset.column(EVENT_LABEL).is_none() {
            return Err(ProfileError::MissingLabel(EVENT_LABEL));
        }
        let row_count = dataset.row_count();
        if row_count == 0 {
            return Err(ProfileError::EmptyDataset);
        }

        let summaries: Vec<FeatureSummary> = dataset
            .columns()
            .iter()
            .map(|column| FeatureSummary::compute(column, row_count, &self.classifier))
            .collect();

        for s in &summaries {
            debug!(
                "{}: {} null={:.4} unique={:.4} -> {:?}",
                s.feature_name,
                s.dtype.as_str(),
                s.null_pct, s.unique_pct, s.feature_type
            );
            if s.feature_warning != FeatureWarning::NoWarning {
                warn!("{}: {}", s.feature_name, s.feature_warning.description());
            }
        }

        Ok(summaries)
    }

    /// Summarize the dataset and derive its training schema
    pub fn profile(&self, dataset: &Dataset) -> Result<Profile, ProfileError> {
        let summaries = self.summarize(dataset)?;
        let label_mapper = label_mapping(dataset)?;

        let apply_exclusions = self.classifier.config().apply_exclusions;
        let model_variables: Vec<String> = summaries
            .iter()
            .filter(|s| s.feature_type.is_model_input())
            .filter(|s| !(apply_exclusions && s.feature_warning.is_exclusion()))
            .map(|s| s.feature_name.clone())
            .collect();

        let event_variables = dataset
            .column_names()
            .into_iter()
            .filter(|name| *name != EVENT_LABEL && *name != EVENT_TIMESTAMP)
            .map(str::to_string)
            .collect();

        let event_labels = label_counts(dataset)?
            .into_iter()
            .map(|(label, _)| label)
            .collect();

        info!(
            "Profiled {} columns over {} rows: {} model variables",
            summaries.len(),
            dataset.row_count(),
            model_variables.len()
        );

        Ok(Profile {
            schema: TrainingDataSchema::new(model_variables.clone(), label_mapper),
            summaries,
            model_variables,
            event_variables,
            event_labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn signups() -> Dataset {
        let n = 100;
        let label: Vec<&str> = (0..n).map(|i| if i < 10 { "fraud" } else { "legit" }).collect();
        let ts: Vec<String> = (0..n).map(|i| format!("2021-01-01T00:00:{:02}Z", i % 60)).collect();
        let ip: Vec<String> = (0..n).map(|i| format!("10.0.0.{}", i)).collect();
        let email: Vec<String> = (0..n).map(|i| format!("u{}@example.com", i % 40)).collect();
        let amount: Vec<String> = (0..n)
            .map(|i| if i % 3 == 0 { String::new() } else { format!("{}.5", i) })
            .collect();
        let sparse: Vec<&str> = (0..n).map(|i| if i < 30 { "x" } else { "" }).collect();
        let merchant: Vec<String> = (0..n).map(|i| format!("m{}", i)).collect();

        Dataset::new(vec![
            Column::from_raw(EVENT_LABEL, &label),
            Column::from_raw(EVENT_TIMESTAMP, &ts),
            Column::from_raw("user_ip", &ip),
            Column::from_raw("email_address", &email),
            Column::from_raw("amount", &amount),
            Column::from_raw("promo_code", &sparse),
            Column::from_raw("merchant", &merchant),
        ])
        .unwrap()
    }

    fn summary<'a>(profile: &'a Profile, name: &str) -> &'a FeatureSummary {
        profile
            .summaries
            .iter()
            .find(|s| s.feature_name == name)
            .unwrap()
    }

    #[test]
    fn test_profile_signups() {
        let profiler = Profiler::new(&ProfilerConfig::default()).unwrap();
        let profile = profiler.profile(&signups()).unwrap();

        assert_eq!(summary(&profile, EVENT_LABEL).feature_type, FeatureType::Target);
        assert_eq!(
            summary(&profile, EVENT_TIMESTAMP).feature_type,
            FeatureType::EventTimestamp
        );
        assert_eq!(summary(&profile, "user_ip").feature_type, FeatureType::IpAddress);
        assert_eq!(
            summary(&profile, "email_address").feature_type,
            FeatureType::EmailAddress
        );
        assert_eq!(summary(&profile, "amount").feature_type, FeatureType::Numeric);
        assert_eq!(
            summary(&profile, "amount").feature_warning,
            FeatureWarning::NullWarning
        );
        assert_eq!(
            summary(&profile, "promo_code").feature_warning,
            FeatureWarning::ExcludeHighNull
        );
        assert_eq!(
            summary(&profile, "merchant").feature_warning,
            FeatureWarning::ExcludeHighCardinality
        );

        // Warnings are advisory by default
        assert_eq!(
            profile.model_variables,
            vec!["user_ip", "email_address", "amount", "promo_code", "merchant"]
        );
        assert_eq!(profile.schema.model_variables, profile.model_variables);
        assert_eq!(profile.schema.label_schema.label_mapper.fraud, vec!["fraud"]);
        assert_eq!(profile.schema.label_schema.label_mapper.legit, vec!["legit"]);
        assert_eq!(profile.event_labels, vec!["fraud", "legit"]);
        assert_eq!(profile.event_variables.len(), 5);
    }

    #[test]
    fn test_exclusions_applied_when_configured() {
        let config = ProfilerConfig {
            apply_exclusions: true,
            ..Default::default()
        };
        let profile = Profiler::new(&config).unwrap().profile(&signups()).unwrap();
        assert_eq!(profile.model_variables, vec!["user_ip", "email_address", "amount"]);
    }

    #[test]
    fn test_missing_label() {
        let dataset = Dataset::new(vec![Column::from_raw("amount", &["1", "2"])]).unwrap();
        let profiler = Profiler::new(&ProfilerConfig::default()).unwrap();
        assert!(matches!(
            profiler.summarize(&dataset),
            Err(ProfileError::MissingLabel(_))
        ));
    }

    #[test]
    fn test_empty_dataset() {
        let dataset = Dataset::from_csv_reader("EVENT_LABEL,amount\n".as_bytes()).unwrap();
        let profiler = Profiler::new(&ProfilerConfig::default()).unwrap();
        assert!(matches!(
            profiler.summarize(&dataset),
            Err(ProfileError::EmptyDataset)
        ));
    }

    #[test]
    fn test_non_binary_label_warns_then_fails() {
        let dataset = Dataset::new(vec![Column::from_raw(EVENT_LABEL, &["a", "b", "c", "c"])]).unwrap();
        let profiler = Profiler::new(&ProfilerConfig::default()).unwrap();

        let summaries = profiler.summarize(&dataset).unwrap();
        assert_eq!(summaries[0].feature_warning, FeatureWarning::LabelNonBinary);
        assert!(matches!(
            profiler.profile(&dataset),
            Err(ProfileError::NonBinaryLabel { distinct: 3, .. })
        ));
    }

    fn arb_cell() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            (0i64..20).prop_map(|v| v.to_string()),
            "[a-d]{1,2}",
        ]
    }

    proptest! {
        #[test]
        fn prop_counts_and_ratios_consistent(
            rows in prop::collection::vec((arb_cell(), arb_cell(), "[xy]"), 1..60)
        ) {
            let a: Vec<String> = rows.iter().map(|r| r.0.clone()).collect();
            let b: Vec<String> = rows.iter().map(|r| r.1.clone()).collect();
            let label: Vec<String> = rows.iter().map(|r| r.2.clone()).collect();
            let dataset = Dataset::new(vec![
                Column::from_raw("a", &a),
                Column::from_raw("b", &b),
                Column::from_raw(EVENT_LABEL, &label),
            ]).unwrap();

            let profiler = Profiler::new(&ProfilerConfig::default()).unwrap();
            for s in profiler.summarize(&dataset).unwrap() {
                prop_assert_eq!(s.null_count + s.not_null_count, dataset.row_count());
                prop_assert!((0.0..=1.0).contains(&s.null_pct));
                prop_assert!((0.0..=1.0).contains(&s.unique_pct));
            }
        }

        #[test]
        fn prop_classification_ignores_other_columns(
            target in prop::collection::vec(arb_cell(), 1..30),
            other in prop::collection::vec(arb_cell(), 30),
        ) {
            let n = target.len();
            let label: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "x" } else { "y" }).collect();
            let alone = Dataset::new(vec![
                Column::from_raw("target", &target),
                Column::from_raw(EVENT_LABEL, &label),
            ]).unwrap();
            let with_other = Dataset::new(vec![
                Column::from_raw("target", &target),
                Column::from_raw("other", &other[..n]),
                Column::from_raw(EVENT_LABEL, &label),
            ]).unwrap();

            let profiler = Profiler::new(&ProfilerConfig::default()).unwrap();
            let a = profiler.summarize(&alone).unwrap().remove(0);
            let b = profiler.summarize(&with_other).unwrap().remove(0);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_minority_label_is_fraud(fraud in 1usize..50, extra in 1usize..50) {
            let mut label = vec!["yes"; fraud];
            label.extend(vec!["no"; fraud + extra]);
            let dataset = Dataset::new(vec![Column::from_raw(EVENT_LABEL, &label)]).unwrap();
            let mapper = label_mapping(&dataset).unwrap();
            prop_assert_eq!(mapper.fraud, vec!["yes".to_string()]);
            prop_assert_eq!(mapper.legit, vec!["no".to_string()]);
        }
    }
}
