//! In-memory simulation of the managed services
//!
//! Status transitions are scripted: each status read advances a countdown, so
//! a test can say "training finishes on the third check" and run the real
//! stage code against it.

use crate::client::{FeatureStore, FraudDetector, QueryEngine, RuleVersionResolver};
use crate::error::ServiceError;
use crate::types::{
    CreateModelVersionRequest, DetectorVersion, DetectorVersionRequest, FeatureGroup,
    ModelVersion, ModelVersionDetail, ModelVersionRef, ModelVersionStatus, QueryRequest,
    QueryState, QueryStatus, RuleRef, TrainingDataSource, TrainingMetrics, TrainingResult,
};
use rule_generator::{GeneratedRule, Outcome};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// A version of a rule stored on a detector
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRule {
    pub version: u64,
    pub expression: String,
    pub outcome: Outcome,
}

#[derive(Debug)]
struct ScriptedGroup {
    group: FeatureGroup,
    pending_reads: u32,
}

#[derive(Debug)]
struct ScriptedQuery {
    pending_reads: u32,
    final_state: QueryState,
    output_location: String,
}

#[derive(Debug)]
struct ScriptedModel {
    version: ModelVersion,
    pending_reads: u32,
    settles_to: ModelVersionStatus,
}

#[derive(Debug)]
struct State {
    groups: HashMap<String, ScriptedGroup>,
    queries: HashMap<String, ScriptedQuery>,
    submitted_queries: Vec<QueryRequest>,
    query_result_csv: String,
    query_running_reads: u32,
    query_final_state: QueryState,
    models: HashMap<(String, String), ScriptedModel>,
    training_reads: u32,
    training_settles_to: ModelVersionStatus,
    training_metrics: TrainingMetrics,
    activation_reads: u32,
    activation_settles_to: ModelVersionStatus,
    outcomes: HashMap<String, String>,
    rules: HashMap<(String, String), Vec<StoredRule>>,
    detector_versions: Vec<DetectorVersionRequest>,
    failures: HashMap<&'static str, VecDeque<ServiceError>>,
}

/// Simulated fraud detection, query and feature store services
#[derive(Debug)]
pub struct InMemoryService {
    state: Mutex<State>,
}

impl Default for InMemoryService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryService {
    /// A service where everything completes on the first check
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                groups: HashMap::new(),
                queries: HashMap::new(),
                submitted_queries: Vec::new(),
                query_result_csv: String::new(),
                query_running_reads: 0,
                query_final_state: QueryState::Succeeded,
                models: HashMap::new(),
                training_reads: 0,
                training_settles_to: ModelVersionStatus::TrainingComplete,
                training_metrics: TrainingMetrics::default(),
                activation_reads: 0,
                activation_settles_to: ModelVersionStatus::Active,
                outcomes: HashMap::new(),
                rules: HashMap::new(),
                detector_versions: Vec::new(),
                failures: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, ServiceError> {
        self.state
            .lock()
            .map_err(|e| ServiceError::transient("InMemoryService", format!("Lock error: {}", e)))
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a feature group whose offline store reports pending for `pending_reads` reads
    pub fn with_feature_group(self, group: FeatureGroup, pending_reads: u32) -> Self {
        self.state().groups.insert(
            group.feature_group_name.clone(),
            ScriptedGroup {
                group,
                pending_reads,
            },
        );
        self
    }

    /// Result of every query, and how many status reads stay `RUNNING`
    pub fn with_query_result(self, csv: impl Into<String>, running_reads: u32) -> Self {
        {
            let mut state = self.state();
            state.query_result_csv = csv.into();
            state.query_running_reads = running_reads;
        }
        self
    }

    /// Make every query end in the given state
    pub fn with_query_final_state(self, final_state: QueryState) -> Self {
        self.state().query_final_state = final_state;
        self
    }

    /// Training stays in progress for `reads` status reads, then settles
    pub fn with_training(self, reads: u32, settles_to: ModelVersionStatus, metrics: TrainingMetrics) -> Self {
        {
            let mut state = self.state();
            state.training_reads = reads;
            state.training_settles_to = settles_to;
            state.training_metrics = metrics;
        }
        self
    }

    /// Activation stays in progress for `reads` status reads, then settles
    pub fn with_activation(self, reads: u32, settles_to: ModelVersionStatus) -> Self {
        {
            let mut state = self.state();
            state.activation_reads = reads;
            state.activation_settles_to = settles_to;
        }
        self
    }

    /// Seed an existing model version
    pub fn with_model_version(self, version: ModelVersion) -> Self {
        let key = (version.model_id.clone(), version.model_version_number.clone());
        let settles_to = version.status.clone();
        self.state().models.insert(
            key,
            ScriptedModel {
                version,
                pending_reads: 0,
                settles_to,
            },
        );
        self
    }

    /// Seed an existing outcome
    pub fn with_outcome(self, name: &str, description: &str) -> Self {
        self.state().outcomes.insert(name.to_string(), description.to_string());
        self
    }

    /// Seed an existing rule at the given latest version
    pub fn with_rule(self, detector_id: &str, rule_id: &str, version: u64) -> Self {
        self.state().rules.insert(
            (detector_id.to_string(), rule_id.to_string()),
            vec![StoredRule {
                version,
                expression: String::new(),
                outcome: Outcome::Approve,
            }],
        );
        self
    }

    /// Fail the next call of `operation` with `error`
    pub fn fail_next(&self, operation: &'static str, error: ServiceError) {
        self.state().failures.entry(operation).or_default().push_back(error);
    }

    /// Queries submitted so far
    pub fn submitted_queries(&self) -> Vec<QueryRequest> {
        self.state().submitted_queries.clone()
    }

    /// Registered outcomes
    pub fn outcomes(&self) -> HashMap<String, String> {
        self.state().outcomes.clone()
    }

    /// All versions of a rule, oldest first
    pub fn rule_versions(&self, detector_id: &str, rule_id: &str) -> Vec<StoredRule> {
        self.state()
            .rules
            .get(&(detector_id.to_string(), rule_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Detector versions created so far
    pub fn detector_versions(&self) -> Vec<DetectorVersionRequest> {
        self.state().detector_versions.clone()
    }

    /// Current stored state of a model version
    pub fn model_version(&self, model_id: &str, version: &str) -> Option<ModelVersion> {
        self.state()
            .models
            .get(&(model_id.to_string(), version.to_string()))
            .map(|m| m.version.clone())
    }

    fn take_failure(state: &mut State, operation: &'static str) -> Result<(), ServiceError> {
        match state.failures.get_mut(operation).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn model_key(model: &ModelVersionRef) -> (String, String) {
        (model.model_id.clone(), model.model_version_number.clone())
    }
}

impl FraudDetector for InMemoryService {
    async fn create_model_version(
        &self,
        request: &CreateModelVersionRequest,
    ) -> Result<ModelVersionRef, ServiceError> {
        let mut state = self.lock()?;
        Self::take_failure(&mut state, "CreateModelVersion")?;

        if request.training_data_schema.model_variables.is_empty() {
            return Err(ServiceError::Terminal {
                operation: "CreateModelVersion".to_string(),
                code: "ValidationException".to_string(),
                message: "trainingDataSchema.modelVariables must not be empty".to_string(),
            });
        }

        let existing = state
            .models
            .keys()
            .filter(|(id, _)| *id == request.model_id)
            .count();
        let reference = ModelVersionRef {
            model_id: request.model_id.clone(),
            model_type: request.model_type,
            model_version_number: format!("{}.0", existing + 1),
        };

        let version = ModelVersion {
            model_id: reference.model_id.clone(),
            model_type: reference.model_type,
            model_version_number: reference.model_version_number.clone(),
            status: ModelVersionStatus::TrainingInProgress,
            training_data_source: Some(TrainingDataSource::ExternalEvents),
            training_data_schema: Some(request.training_data_schema.clone()),
            external_events_detail: Some(request.external_events_detail.clone()),
            arn: None,
        };
        let settles_to = state.training_settles_to.clone();
        let pending_reads = state.training_reads;
        state.models.insert(
            Self::model_key(&reference),
            ScriptedModel {
                version,
                pending_reads,
                settles_to,
            },
        );

        debug!("Simulated training started for {:?}", reference);
        Ok(reference)
    }

    async fn get_model_version(&self, model: &ModelVersionRef) -> Result<ModelVersion, ServiceError> {
        let mut state = self.lock()?;
        Self::take_failure(&mut state, "GetModelVersion")?;

        let scripted = state
            .models
            .get_mut(&Self::model_key(model))
            .ok_or_else(|| ServiceError::NotFound(format!("model version {:?}", model)))?;

        if scripted.pending_reads > 0 {
            scripted.pending_reads -= 1;
        } else {
            scripted.version.status = scripted.settles_to.clone();
        }
        Ok(scripted.version.clone())
    }

    async fn describe_model_versions(
        &self,
        model: &ModelVersionRef,
        _max_results: u32,
    ) -> Result<Vec<ModelVersionDetail>, ServiceError> {
        let mut state = self.lock()?;
        Self::take_failure(&mut state, "DescribeModelVersions")?;

        let metrics = state.training_metrics.clone();
        let scripted = state
            .models
            .get(&Self::model_key(model))
            .ok_or_else(|| ServiceError::NotFound(format!("model version {:?}", model)))?;

        Ok(vec![ModelVersionDetail {
            model_id: scripted.version.model_id.clone(),
            model_type: scripted.version.model_type,
            model_version_number: scripted.version.model_version_number.clone(),
            status: scripted.version.status.clone(),
            training_result: Some(TrainingResult {
                training_metrics: Some(metrics),
            }),
        }])
    }

    async fn update_model_version_status(
        &self,
        model: &ModelVersionRef,
        status: ModelVersionStatus,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        Self::take_failure(&mut state, "UpdateModelVersionStatus")?;

        let activation_reads = state.activation_reads;
        let activation_settles_to = state.activation_settles_to.clone();
        let scripted = state
            .models
            .get_mut(&Self::model_key(model))
            .ok_or_else(|| ServiceError::NotFound(format!("model version {:?}", model)))?;

        if status == ModelVersionStatus::Active {
            scripted.version.status = ModelVersionStatus::ActivateInProgress;
            scripted.pending_reads = activation_reads;
            scripted.settles_to = activation_settles_to;
        } else {
            scripted.version.status = status.clone();
            scripted.pending_reads = 0;
            scripted.settles_to = status;
        }
        Ok(())
    }

    async fn outcome_exists(&self, name: &str) -> Result<bool, ServiceError> {
        let mut state = self.lock()?;
        Self::take_failure(&mut state, "GetOutcomes")?;
        Ok(state.outcomes.contains_key(name))
    }

    async fn put_outcome(&self, name: &str, description: &str) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        Self::take_failure(&mut state, "PutOutcome")?;
        state.outcomes.insert(name.to_string(), description.to_string());
        Ok(())
    }

    async fn create_rule(&self, detector_id: &str, rule: &GeneratedRule) -> Result<RuleRef, ServiceError> {
        let mut state = self.lock()?;
        Self::take_failure(&mut state, "CreateRule")?;

        if !state.outcomes.contains_key(rule.outcome.as_str()) {
            return Err(ServiceError::NotFound(format!("outcome {}", rule.outcome)));
        }

        let key = (detector_id.to_string(), rule.rule_id.clone());
        if state.rules.contains_key(&key) {
            return Err(ServiceError::AlreadyExists(
                "Failed to save rule since it already exists.".to_string(),
            ));
        }

        state.rules.insert(
            key,
            vec![StoredRule {
                version: 1,
                expression: rule.expression.clone(),
                outcome: rule.outcome,
            }],
        );
        Ok(RuleRef {
            detector_id: detector_id.to_string(),
            rule_id: rule.rule_id.clone(),
            rule_version: "1".to_string(),
        })
    }

    async fn update_rule_version(
        &self,
        current: &RuleRef,
        rule: &GeneratedRule,
    ) -> Result<RuleRef, ServiceError> {
        let mut state = self.lock()?;
        Self::take_failure(&mut state, "UpdateRuleVersion")?;

        let versions = state
            .rules
            .get_mut(&(current.detector_id.clone(), current.rule_id.clone()))
            .ok_or_else(|| ServiceError::NotFound(format!("rule {}", current.rule_id)))?;
        let latest = versions.last().map(|r| r.version).unwrap_or(0);

        if current.rule_version != latest.to_string() {
            return Err(ServiceError::Terminal {
                operation: "UpdateRuleVersion".to_string(),
                code: "ValidationException".to_string(),
                message: format!(
                    "Cannot update rule version {} whereas the most recent version is {}. Specify the latest version.",
                    current.rule_version, latest
                ),
            });
        }

        versions.push(StoredRule {
            version: latest + 1,
            expression: rule.expression.clone(),
            outcome: rule.outcome,
        });
        Ok(RuleRef {
            detector_id: current.detector_id.clone(),
            rule_id: current.rule_id.clone(),
            rule_version: (latest + 1).to_string(),
        })
    }

    async fn create_detector_version(
        &self,
        request: &DetectorVersionRequest,
    ) -> Result<DetectorVersion, ServiceError> {
        let mut state = self.lock()?;
        Self::take_failure(&mut state, "CreateDetectorVersion")?;

        for model in &request.model_versions {
            let active = state
                .models
                .get(&Self::model_key(model))
                .map(|m| m.version.status == ModelVersionStatus::Active)
                .unwrap_or(false);
            if !active {
                return Err(ServiceError::Terminal {
                    operation: "CreateDetectorVersion".to_string(),
                    code: "ValidationException".to_string(),
                    message: format!("model version {} is not active", model.model_version_number),
                });
            }
        }

        state.detector_versions.push(request.clone());
        Ok(DetectorVersion {
            detector_id: request.detector_id.clone(),
            detector_version_id: state.detector_versions.len().to_string(),
            status: "DRAFT".to_string(),
        })
    }
}

impl RuleVersionResolver for InMemoryService {
    async fn current_rule_version(
        &self,
        detector_id: &str,
        rule: &GeneratedRule,
    ) -> Result<String, ServiceError> {
        let state = self.lock()?;
        state
            .rules
            .get(&(detector_id.to_string(), rule.rule_id.clone()))
            .and_then(|versions| versions.last())
            .map(|r| r.version.to_string())
            .ok_or_else(|| ServiceError::NotFound(format!("rule {}", rule.rule_id)))
    }
}

impl QueryEngine for InMemoryService {
    async fn start_query(&self, request: &QueryRequest) -> Result<String, ServiceError> {
        let mut state = self.lock()?;
        Self::take_failure(&mut state, "StartQueryExecution")?;

        let id = uuid::Uuid::new_v4().to_string();
        let output_location = format!("{}{}.csv", request.output_location, id);
        let scripted = ScriptedQuery {
            pending_reads: state.query_running_reads,
            final_state: state.query_final_state,
            output_location,
        };
        state.queries.insert(id.clone(), scripted);
        state.submitted_queries.push(request.clone());
        Ok(id)
    }

    async fn get_query_status(&self, execution_id: &str) -> Result<QueryStatus, ServiceError> {
        let mut state = self.lock()?;
        Self::take_failure(&mut state, "GetQueryExecution")?;

        let query = state
            .queries
            .get_mut(execution_id)
            .ok_or_else(|| ServiceError::NotFound(format!("query {}", execution_id)))?;

        let current = if query.pending_reads > 0 {
            query.pending_reads -= 1;
            QueryState::Running
        } else {
            query.final_state
        };
        Ok(QueryStatus {
            state: current,
            reason: (current == QueryState::Failed).then(|| "simulated failure".to_string()),
            output_location: Some(query.output_location.clone()),
        })
    }

    async fn get_query_results(&self, execution_id: &str) -> Result<String, ServiceError> {
        let mut state = self.lock()?;
        Self::take_failure(&mut state, "GetQueryResults")?;

        match state.queries.get(execution_id) {
            Some(q) if q.pending_reads == 0 && q.final_state == QueryState::Succeeded => {
                Ok(state.query_result_csv.clone())
            }
            Some(_) => Err(ServiceError::Terminal {
                operation: "GetQueryResults".to_string(),
                code: "InvalidRequestException".to_string(),
                message: format!("query {} has not succeeded", execution_id),
            }),
            None => Err(ServiceError::NotFound(format!("query {}", execution_id))),
        }
    }
}

impl FeatureStore for InMemoryService {
    async fn describe_feature_group(&self, name: &str) -> Result<FeatureGroup, ServiceError> {
        let mut state = self.lock()?;
        Self::take_failure(&mut state, "DescribeFeatureGroup")?;

        let scripted = state
            .groups
            .get_mut(name)
            .ok_or_else(|| ServiceError::NotFound(format!("feature group {}", name)))?;

        if scripted.pending_reads > 0 {
            scripted.pending_reads -= 1;
            return Ok(FeatureGroup {
                offline_store_status: None,
                ..scripted.group.clone()
            });
        }
        Ok(scripted.group.clone())
    }
}
