//! Pipeline configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `FRAUD_PIPELINE__SECTION__KEY` environment variables. CLI flags
//! are applied on top by the binary.

use crate::error::PipelineError;
use feature_profiler::ProfilerConfig;
use fraud_service::{PollConfig, ServiceEndpoints};
use rule_generator::RuleGeneratorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const ENV_PREFIX: &str = "FRAUD_PIPELINE";
pub const DEFAULT_BASE_DIR: &str = "/opt/ml/processing";

/// How the current version of an existing rule is found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleVersionStrategy {
    /// Provoke a version conflict and read the version from the message
    #[default]
    ConflictMessage,
    /// List the rule's versions and take the highest
    GetRules,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub region: String,
    /// Explicit endpoints; regional public endpoints when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<ServiceEndpoints>,
    pub request_timeout_secs: u64,
    pub rule_version_strategy: RuleVersionStrategy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoints: None,
            request_timeout_secs: 30,
            rule_version_strategy: RuleVersionStrategy::default(),
        }
    }
}

impl ServiceConfig {
    pub fn endpoints(&self) -> ServiceEndpoints {
        self.endpoints
            .clone()
            .unwrap_or_else(|| ServiceEndpoints::for_region(&self.region))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the stage input/output directory tree
    pub base_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Model training and activation
    pub model: PollConfig,
    /// Feature store readiness and queries
    pub query: PollConfig,
}

impl PollingConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, poll) in [("model", &self.model), ("query", &self.query)] {
            poll.validate()
                .map_err(|e| PipelineError::Validation(format!("polling.{}: {}", name, e)))?;
        }
        Ok(())
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            model: PollConfig::model(),
            query: PollConfig::query(),
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub service: ServiceConfig,
    pub paths: PathsConfig,
    pub polling: PollingConfig,
    pub profiler: ProfilerConfig,
    pub rules: RuleGeneratorConfig,
}

impl PipelineConfig {
    /// Load defaults, then `file` if given, then the environment
    pub fn load(file: Option<&Path>) -> Result<Self, PipelineError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&PipelineConfig::default())?);

        if let Some(path) = file {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: PipelineConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.polling.validate()?;
        Ok(config)
    }
}
