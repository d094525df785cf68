//! Request and response shapes of the managed services

use feature_profiler::TrainingDataSchema;
use rule_generator::MetricDataPoint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Model family trained by the fraud detection service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelType {
    OnlineFraudInsights,
    TransactionFraudInsights,
    AccountTakeoverInsights,
}

/// Lifecycle status of a model version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelVersionStatus {
    TrainingInProgress,
    TrainingComplete,
    ActivateRequested,
    ActivateInProgress,
    Active,
    InactivateRequested,
    InactivateInProgress,
    Inactive,
    Error,
    TrainingCancelled,
    /// A status this client does not know about, kept verbatim
    Other(String),
}

impl ModelVersionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ModelVersionStatus::TrainingInProgress => "TRAINING_IN_PROGRESS",
            ModelVersionStatus::TrainingComplete => "TRAINING_COMPLETE",
            ModelVersionStatus::ActivateRequested => "ACTIVATE_REQUESTED",
            ModelVersionStatus::ActivateInProgress => "ACTIVATE_IN_PROGRESS",
            ModelVersionStatus::Active => "ACTIVE",
            ModelVersionStatus::InactivateRequested => "INACTIVATE_REQUESTED",
            ModelVersionStatus::InactivateInProgress => "INACTIVATE_IN_PROGRESS",
            ModelVersionStatus::Inactive => "INACTIVE",
            ModelVersionStatus::Error => "ERROR",
            ModelVersionStatus::TrainingCancelled => "TRAINING_CANCELLED",
            ModelVersionStatus::Other(s) => s,
        }
    }
}

impl From<String> for ModelVersionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "TRAINING_IN_PROGRESS" => ModelVersionStatus::TrainingInProgress,
            "TRAINING_COMPLETE" => ModelVersionStatus::TrainingComplete,
            "ACTIVATE_REQUESTED" => ModelVersionStatus::ActivateRequested,
            "ACTIVATE_IN_PROGRESS" => ModelVersionStatus::ActivateInProgress,
            "ACTIVE" => ModelVersionStatus::Active,
            "INACTIVATE_REQUESTED" => ModelVersionStatus::InactivateRequested,
            "INACTIVATE_IN_PROGRESS" => ModelVersionStatus::InactivateInProgress,
            "INACTIVE" => ModelVersionStatus::Inactive,
            "ERROR" => ModelVersionStatus::Error,
            "TRAINING_CANCELLED" => ModelVersionStatus::TrainingCancelled,
            _ => ModelVersionStatus::Other(s),
        }
    }
}

impl From<ModelVersionStatus> for String {
    fn from(status: ModelVersionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ModelVersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one version of a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelVersionRef {
    pub model_id: String,
    pub model_type: ModelType,
    pub model_version_number: String,
}

/// Location of externally stored training events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalEventsDetail {
    pub data_location: String,
    pub data_access_role_arn: String,
}

/// Where the training events come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainingDataSource {
    ExternalEvents,
    IngestedEvents,
}

/// Training submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateModelVersionRequest {
    pub model_id: String,
    pub model_type: ModelType,
    pub training_data_source: TrainingDataSource,
    pub training_data_schema: TrainingDataSchema,
    pub external_events_detail: ExternalEventsDetail,
}

/// Model version as reported by the service; persisted between stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelVersion {
    pub model_id: String,
    pub model_type: ModelType,
    pub model_version_number: String,
    pub status: ModelVersionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_data_source: Option<TrainingDataSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_data_schema: Option<TrainingDataSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_events_detail: Option<ExternalEventsDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
}

impl ModelVersion {
    pub fn reference(&self) -> ModelVersionRef {
        ModelVersionRef {
            model_id: self.model_id.clone(),
            model_type: self.model_type,
            model_version_number: self.model_version_number.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auc: Option<f64>,
    #[serde(default)]
    pub metric_data_points: Vec<MetricDataPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_metrics: Option<TrainingMetrics>,
}

/// Detailed description of a model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelVersionDetail {
    pub model_id: String,
    pub model_type: ModelType,
    pub model_version_number: String,
    pub status: ModelVersionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_result: Option<TrainingResult>,
}

impl ModelVersionDetail {
    pub fn training_metrics(&self) -> Option<&TrainingMetrics> {
        self.training_result
            .as_ref()
            .and_then(|r| r.training_metrics.as_ref())
    }
}

/// Identifies one version of a rule on a detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRef {
    pub detector_id: String,
    pub rule_id: String,
    pub rule_version: String,
}

/// How a detector evaluates its rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleExecutionMode {
    FirstMatched,
    AllMatched,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorVersionRequest {
    pub detector_id: String,
    pub rules: Vec<RuleRef>,
    pub model_versions: Vec<ModelVersionRef>,
    pub rule_execution_mode: RuleExecutionMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorVersion {
    pub detector_id: String,
    pub detector_version_id: String,
    pub status: String,
}

/// One feature of a feature group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FeatureDefinition {
    pub feature_name: String,
    pub feature_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataCatalogConfig {
    pub table_name: String,
    pub database: String,
    #[serde(default)]
    pub catalog: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OfflineStoreConfig {
    #[serde(default)]
    pub data_catalog_config: Option<DataCatalogConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfflineStoreState {
    Active,
    Blocked,
    Disabled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OfflineStoreStatus {
    pub status: OfflineStoreState,
    #[serde(default)]
    pub blocked_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureGroupStatus {
    Creating,
    Created,
    CreateFailed,
    Deleting,
    DeleteFailed,
    #[serde(other)]
    Unknown,
}

/// Readiness of a feature group's offline store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineReadiness {
    Ready,
    Pending,
    Failed,
}

/// Description of a feature group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FeatureGroup {
    pub feature_group_name: String,
    #[serde(default)]
    pub feature_definitions: Vec<FeatureDefinition>,
    #[serde(default)]
    pub feature_group_status: Option<FeatureGroupStatus>,
    #[serde(default)]
    pub offline_store_config: Option<OfflineStoreConfig>,
    #[serde(default)]
    pub offline_store_status: Option<OfflineStoreStatus>,
}

impl FeatureGroup {
    pub fn offline_readiness(&self) -> OfflineReadiness {
        if matches!(
            self.feature_group_status,
            Some(FeatureGroupStatus::CreateFailed)
                | Some(FeatureGroupStatus::Deleting)
                | Some(FeatureGroupStatus::DeleteFailed)
        ) {
            return OfflineReadiness::Failed;
        }
        match self.offline_store_status.as_ref().map(|s| s.status) {
            Some(OfflineStoreState::Active) => OfflineReadiness::Ready,
            Some(OfflineStoreState::Disabled) => OfflineReadiness::Failed,
            _ => OfflineReadiness::Pending,
        }
    }

    /// Status text for logs
    pub fn status_summary(&self) -> String {
        format!(
            "{:?}/{:?}",
            self.feature_group_status,
            self.offline_store_status.as_ref().map(|s| s.status)
        )
    }

    pub fn data_catalog(&self) -> Option<&DataCatalogConfig> {
        self.offline_store_config
            .as_ref()
            .and_then(|c| c.data_catalog_config.as_ref())
    }
}

/// Query submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub query: String,
    pub database: String,
    pub output_location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl QueryState {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryState::Queued => "QUEUED",
            QueryState::Running => "RUNNING",
            QueryState::Succeeded => "SUCCEEDED",
            QueryState::Failed => "FAILED",
            QueryState::Cancelled => "CANCELLED",
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, QueryState::Queued | QueryState::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryStatus {
    pub state: QueryState,
    pub reason: Option<String>,
    pub output_location: Option<String>,
}
