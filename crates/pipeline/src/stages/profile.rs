//! Profile a training CSV

use crate::error::PipelineError;
use feature_profiler::{Dataset, Profile, Profiler, ProfilerConfig};
use std::path::Path;
use tracing::info;

/// Load `csv` and run the profiler over it
pub fn profile_csv(csv: &Path, config: &ProfilerConfig) -> Result<Profile, PipelineError> {
    if !csv.exists() {
        return Err(PipelineError::Validation(format!(
            "Training data not found: {}",
            csv.display()
        )));
    }
    let dataset = Dataset::from_csv_path(csv)?;
    info!(
        "Profiling {} ({} rows, {} columns)",
        csv.display(),
        dataset.row_count(),
        dataset.columns().len()
    );
    Ok(Profiler::new(config)?.profile(&dataset)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_profiler::{FeatureType, ProfileError};

    #[test]
    fn test_profile_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut body = String::from("user_ip,email,amount,EVENT_LABEL\n");
        for i in 0..20 {
            let label = if i < 4 { "fraud" } else { "legit" };
            body.push_str(&format!("10.0.0.{},u{}@x.com,{}.25,{}\n", i, i, i, label));
        }
        std::fs::write(&path, body).unwrap();

        let profile = profile_csv(&path, &ProfilerConfig::default()).unwrap();
        let ip = profile
            .summaries
            .iter()
            .find(|s| s.feature_name == "user_ip")
            .unwrap();
        assert_eq!(ip.feature_type, FeatureType::IpAddress);
        assert_eq!(profile.schema.label_schema.label_mapper.fraud, vec!["fraud"]);
        assert_eq!(profile.model_variables, vec!["user_ip", "email", "amount"]);
    }

    #[test]
    fn test_missing_csv() {
        let result = profile_csv(Path::new("/nonexistent/data.csv"), &ProfilerConfig::default());
        assert!(matches!(result, Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_missing_label_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        let result = profile_csv(&path, &ProfilerConfig::default());
        assert!(matches!(
            result,
            Err(PipelineError::Profile(ProfileError::MissingLabel(_)))
        ));
    }
}
