//! Service capabilities
//!
//! Each managed service is reached through a narrow trait so stages can run
//! against the HTTP client or the in-memory simulation alike.

#![allow(async_fn_in_trait)]

use crate::error::ServiceError;
use crate::types::{
    CreateModelVersionRequest, DetectorVersion, DetectorVersionRequest, FeatureGroup,
    ModelVersion, ModelVersionDetail, ModelVersionRef, ModelVersionStatus, QueryRequest,
    QueryStatus, RuleRef,
};
use rule_generator::GeneratedRule;
use tracing::debug;

/// Model, rule, outcome and detector operations of the fraud detection service
pub trait FraudDetector {
    /// Submit a training job; returns the new version
    async fn create_model_version(
        &self,
        request: &CreateModelVersionRequest,
    ) -> Result<ModelVersionRef, ServiceError>;

    async fn get_model_version(&self, model: &ModelVersionRef) -> Result<ModelVersion, ServiceError>;

    async fn describe_model_versions(
        &self,
        model: &ModelVersionRef,
        max_results: u32,
    ) -> Result<Vec<ModelVersionDetail>, ServiceError>;

    async fn update_model_version_status(
        &self,
        model: &ModelVersionRef,
        status: ModelVersionStatus,
    ) -> Result<(), ServiceError>;

    /// Whether an outcome with this name is registered
    async fn outcome_exists(&self, name: &str) -> Result<bool, ServiceError>;

    async fn put_outcome(&self, name: &str, description: &str) -> Result<(), ServiceError>;

    /// Create a rule at version 1; fails with `AlreadyExists` if the id is taken
    async fn create_rule(&self, detector_id: &str, rule: &GeneratedRule) -> Result<RuleRef, ServiceError>;

    /// Create a new version of `current` with the rule's expression and outcome
    async fn update_rule_version(
        &self,
        current: &RuleRef,
        rule: &GeneratedRule,
    ) -> Result<RuleRef, ServiceError>;

    async fn create_detector_version(
        &self,
        request: &DetectorVersionRequest,
    ) -> Result<DetectorVersion, ServiceError>;
}

/// Looks up the latest version of an existing rule
pub trait RuleVersionResolver {
    async fn current_rule_version(
        &self,
        detector_id: &str,
        rule: &GeneratedRule,
    ) -> Result<String, ServiceError>;
}

/// SQL execution over the offline feature store
pub trait QueryEngine {
    /// Submit a query; returns its execution id
    async fn start_query(&self, request: &QueryRequest) -> Result<String, ServiceError>;

    async fn get_query_status(&self, execution_id: &str) -> Result<QueryStatus, ServiceError>;

    /// Result rows of a finished query rendered as CSV with a header row
    async fn get_query_results(&self, execution_id: &str) -> Result<String, ServiceError>;
}

/// Feature group metadata
pub trait FeatureStore {
    async fn describe_feature_group(&self, name: &str) -> Result<FeatureGroup, ServiceError>;
}

/// Version that no rule reaches, used to provoke the version conflict message
pub const SENTINEL_RULE_VERSION: &str = "9999";

const CONFLICT_MARKER: &str = "whereas the most recent version is";

/// Extract the latest version number from a rule version conflict message
pub fn parse_conflict_version(message: &str) -> Option<String> {
    let rest = &message[message.find(CONFLICT_MARKER)? + CONFLICT_MARKER.len()..];
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    (!digits.is_empty()).then_some(digits)
}

/// Resolves rule versions by updating against a sentinel version and reading
/// the latest version out of the service's rejection message
pub struct ConflictMessageResolver<'a, D> {
    detector: &'a D,
}

impl<'a, D: FraudDetector> ConflictMessageResolver<'a, D> {
    pub fn new(detector: &'a D) -> Self {
        Self { detector }
    }
}

impl<D: FraudDetector> RuleVersionResolver for ConflictMessageResolver<'_, D> {
    async fn current_rule_version(
        &self,
        detector_id: &str,
        rule: &GeneratedRule,
    ) -> Result<String, ServiceError> {
        let probe = RuleRef {
            detector_id: detector_id.to_string(),
            rule_id: rule.rule_id.clone(),
            rule_version: SENTINEL_RULE_VERSION.to_string(),
        };

        match self.detector.update_rule_version(&probe, rule).await {
            Ok(updated) => Err(ServiceError::decode(
                "UpdateRuleVersion",
                format!(
                    "sentinel update of {} unexpectedly succeeded as version {}",
                    rule.rule_id, updated.rule_version
                ),
            )),
            Err(err) => match parse_conflict_version(err.message()) {
                Some(version) => {
                    debug!("Rule {} is at version {}", rule.rule_id, version);
                    Ok(version)
                }
                None => Err(err),
            },
        }
    }
}
