//! HTTP client for the managed services
//!
//! Every operation is a JSON POST carrying an `X-Amz-Target` header naming the
//! operation. Requests are not signed; point the endpoints at a signing gateway
//! or a local emulator.

use crate::client::{FeatureStore, FraudDetector, QueryEngine, RuleVersionResolver};
use crate::error::ServiceError;
use crate::types::{
    CreateModelVersionRequest, DetectorVersion, DetectorVersionRequest, FeatureGroup,
    ModelVersion, ModelVersionDetail, ModelVersionRef, ModelVersionStatus, QueryRequest,
    QueryState, QueryStatus, RuleRef,
};
use rule_generator::GeneratedRule;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const RULE_LANGUAGE: &str = "DETECTORPL";

/// Base URLs of the three services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoints {
    pub fraud_detector: String,
    pub athena: String,
    pub sagemaker: String,
}

impl ServiceEndpoints {
    /// Public regional endpoints
    pub fn for_region(region: &str) -> Self {
        Self {
            fraud_detector: format!("https://frauddetector.{}.amazonaws.com", region),
            athena: format!("https://athena.{}.amazonaws.com", region),
            sagemaker: format!("https://api.sagemaker.{}.amazonaws.com", region),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Service {
    FraudDetector,
    Athena,
    SageMaker,
}

impl Service {
    fn target_prefix(self) -> &'static str {
        match self {
            Service::FraudDetector => "AWSHawksNestServiceFacade",
            Service::Athena => "AmazonAthena",
            Service::SageMaker => "SageMaker",
        }
    }
}

/// Error body returned by the services
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(alias = "Message", default)]
    message: String,
}

/// Classify a failed response
fn classify_error(operation: &str, status: u16, body: &str) -> ServiceError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    // "com.amazonaws...#ValidationException" -> "ValidationException"
    let code = parsed.kind.rsplit('#').next().unwrap_or_default().to_string();
    let message = if parsed.message.is_empty() {
        body.to_string()
    } else {
        parsed.message
    };

    if status >= 500
        || status == 429
        || code.contains("Throttling")
        || code.contains("InternalServer")
        || code.contains("ServiceUnavailable")
    {
        ServiceError::transient(operation, message)
    } else if code.contains("ResourceNotFound") || status == 404 {
        ServiceError::NotFound(message)
    } else if message.contains("already exists") {
        ServiceError::AlreadyExists(message)
    } else {
        ServiceError::Terminal {
            operation: operation.to_string(),
            code,
            message,
        }
    }
}

/// Client for the fraud detection, query and feature store services
pub struct HttpServiceClient {
    http: reqwest::Client,
    endpoints: ServiceEndpoints,
}

impl HttpServiceClient {
    /// Create a client with a per-request timeout
    pub fn new(endpoints: ServiceEndpoints, timeout: Duration) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Validation(format!("HTTP client setup failed: {}", e)))?;

        info!("Service endpoints: {:?}", endpoints);
        Ok(Self { http, endpoints })
    }

    fn endpoint(&self, service: Service) -> &str {
        match service {
            Service::FraudDetector => &self.endpoints.fraud_detector,
            Service::Athena => &self.endpoints.athena,
            Service::SageMaker => &self.endpoints.sagemaker,
        }
    }

    async fn call<Req, Resp>(&self, service: Service, operation: &str, body: &Req) -> Result<Resp, ServiceError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)
            .map_err(|e| ServiceError::Validation(format!("{}: cannot encode request: {}", operation, e)))?;

        debug!("{} {}", service.target_prefix(), operation);
        let response = self
            .http
            .post(self.endpoint(service))
            .header(reqwest::header::CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header("X-Amz-Target", format!("{}.{}", service.target_prefix(), operation))
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    ServiceError::transient(operation, e.to_string())
                } else {
                    ServiceError::Terminal {
                        operation: operation.to_string(),
                        code: "HttpError".to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::transient(operation, e.to_string()))?;

        if !status.is_success() {
            return Err(classify_error(operation, status.as_u16(), &text));
        }

        // Operations without output return an empty body
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| ServiceError::decode(operation, e.to_string()))
    }
}

fn rule_body(detector_id: &str, rule_id: &str, rule: &GeneratedRule) -> serde_json::Value {
    json!({
        "detectorId": detector_id,
        "ruleId": rule_id,
        "expression": rule.expression,
        "language": RULE_LANGUAGE,
        "outcomes": [rule.outcome.as_str()],
    })
}

#[derive(Deserialize)]
struct RuleEnvelope {
    rule: RuleRef,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelVersionDetails {
    #[serde(default)]
    model_version_details: Vec<ModelVersionDetail>,
}

impl FraudDetector for HttpServiceClient {
    async fn create_model_version(
        &self,
        request: &CreateModelVersionRequest,
    ) -> Result<ModelVersionRef, ServiceError> {
        self.call(Service::FraudDetector, "CreateModelVersion", request).await
    }

    async fn get_model_version(&self, model: &ModelVersionRef) -> Result<ModelVersion, ServiceError> {
        self.call(Service::FraudDetector, "GetModelVersion", model).await
    }

    async fn describe_model_versions(
        &self,
        model: &ModelVersionRef,
        max_results: u32,
    ) -> Result<Vec<ModelVersionDetail>, ServiceError> {
        let body = json!({
            "modelId": model.model_id,
            "modelType": model.model_type,
            "modelVersionNumber": model.model_version_number,
            "maxResults": max_results,
        });
        let details: ModelVersionDetails =
            self.call(Service::FraudDetector, "DescribeModelVersions", &body).await?;
        Ok(details.model_version_details)
    }

    async fn update_model_version_status(
        &self,
        model: &ModelVersionRef,
        status: ModelVersionStatus,
    ) -> Result<(), ServiceError> {
        let body = json!({
            "modelId": model.model_id,
            "modelType": model.model_type,
            "modelVersionNumber": model.model_version_number,
            "status": status,
        });
        let _: serde_json::Value = self
            .call(Service::FraudDetector, "UpdateModelVersionStatus", &body)
            .await?;
        Ok(())
    }

    async fn outcome_exists(&self, name: &str) -> Result<bool, ServiceError> {
        let result: Result<serde_json::Value, _> = self
            .call(Service::FraudDetector, "GetOutcomes", &json!({ "name": name }))
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(ServiceError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn put_outcome(&self, name: &str, description: &str) -> Result<(), ServiceError> {
        let _: serde_json::Value = self
            .call(
                Service::FraudDetector,
                "PutOutcome",
                &json!({ "name": name, "description": description }),
            )
            .await?;
        Ok(())
    }

    async fn create_rule(&self, detector_id: &str, rule: &GeneratedRule) -> Result<RuleRef, ServiceError> {
        let envelope: RuleEnvelope = self
            .call(
                Service::FraudDetector,
                "CreateRule",
                &rule_body(detector_id, &rule.rule_id, rule),
            )
            .await?;
        Ok(envelope.rule)
    }

    async fn update_rule_version(
        &self,
        current: &RuleRef,
        rule: &GeneratedRule,
    ) -> Result<RuleRef, ServiceError> {
        let body = json!({
            "rule": current,
            "expression": rule.expression,
            "language": RULE_LANGUAGE,
            "outcomes": [rule.outcome.as_str()],
        });
        let envelope: RuleEnvelope = self
            .call(Service::FraudDetector, "UpdateRuleVersion", &body)
            .await?;
        Ok(envelope.rule)
    }

    async fn create_detector_version(
        &self,
        request: &DetectorVersionRequest,
    ) -> Result<DetectorVersion, ServiceError> {
        self.call(Service::FraudDetector, "CreateDetectorVersion", request).await
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleDetail {
    rule_version: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleDetails {
    #[serde(default)]
    rule_details: Vec<RuleDetail>,
}

/// Version lookup through the rule listing operation
impl RuleVersionResolver for HttpServiceClient {
    async fn current_rule_version(
        &self,
        detector_id: &str,
        rule: &GeneratedRule,
    ) -> Result<String, ServiceError> {
        let details: RuleDetails = self
            .call(
                Service::FraudDetector,
                "GetRules",
                &json!({ "detectorId": detector_id, "ruleId": rule.rule_id }),
            )
            .await?;

        details
            .rule_details
            .into_iter()
            .filter_map(|d| d.rule_version.parse::<u64>().ok())
            .max()
            .map(|v| v.to_string())
            .ok_or_else(|| ServiceError::NotFound(format!("no versions of rule {}", rule.rule_id)))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryResponse {
    query_execution_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecutionStatus {
    state: QueryState,
    #[serde(default)]
    state_change_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultConfiguration {
    #[serde(default)]
    output_location: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecution {
    status: QueryExecutionStatus,
    #[serde(default)]
    result_configuration: Option<ResultConfiguration>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryExecutionResponse {
    query_execution: QueryExecution,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Datum {
    #[serde(default)]
    var_char_value: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Row {
    #[serde(default)]
    data: Vec<Datum>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultSet {
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryResultsResponse {
    result_set: ResultSet,
    #[serde(default)]
    next_token: Option<String>,
}

/// Write result rows as CSV; the first row is the header
fn rows_to_csv(operation: &str, rows: &[Row]) -> Result<String, ServiceError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .write_record(row.data.iter().map(|d| d.var_char_value.as_deref().unwrap_or("")))
            .map_err(|e| ServiceError::decode(operation, e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ServiceError::decode(operation, e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ServiceError::decode(operation, e.to_string()))
}

impl QueryEngine for HttpServiceClient {
    async fn start_query(&self, request: &QueryRequest) -> Result<String, ServiceError> {
        let body = json!({
            "QueryString": request.query,
            "QueryExecutionContext": { "Database": request.database },
            "ResultConfiguration": { "OutputLocation": request.output_location },
        });
        let response: StartQueryResponse =
            self.call(Service::Athena, "StartQueryExecution", &body).await?;
        Ok(response.query_execution_id)
    }

    async fn get_query_status(&self, execution_id: &str) -> Result<QueryStatus, ServiceError> {
        let response: GetQueryExecutionResponse = self
            .call(
                Service::Athena,
                "GetQueryExecution",
                &json!({ "QueryExecutionId": execution_id }),
            )
            .await?;
        let execution = response.query_execution;
        Ok(QueryStatus {
            state: execution.status.state,
            reason: execution.status.state_change_reason,
            output_location: execution.result_configuration.and_then(|c| c.output_location),
        })
    }

    async fn get_query_results(&self, execution_id: &str) -> Result<String, ServiceError> {
        let mut rows = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut body = json!({ "QueryExecutionId": execution_id });
            if let Some(token) = &next_token {
                body["NextToken"] = json!(token);
            }
            let page: GetQueryResultsResponse =
                self.call(Service::Athena, "GetQueryResults", &body).await?;
            rows.extend(page.result_set.rows);

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        debug!("Fetched {} result rows for {}", rows.len(), execution_id);
        rows_to_csv("GetQueryResults", &rows)
    }
}

impl FeatureStore for HttpServiceClient {
    async fn describe_feature_group(&self, name: &str) -> Result<FeatureGroup, ServiceError> {
        self.call(
            Service::SageMaker,
            "DescribeFeatureGroup",
            &json!({ "FeatureGroupName": name }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use rule_generator::Outcome;
    use std::sync::{Arc, Mutex};

    /// Target header, content type and body of one received request
    #[derive(Debug, Clone)]
    struct Received {
        target: String,
        content_type: String,
        body: serde_json::Value,
    }

    type Log = Arc<Mutex<Vec<Received>>>;

    fn header(headers: &HeaderMap, name: &str) -> String {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    /// Canned service behaviour keyed on the operation
    async fn respond(State(log): State<Log>, headers: HeaderMap, body: String) -> (StatusCode, String) {
        let target = header(&headers, "x-amz-target");
        let body: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
        log.lock().unwrap().push(Received {
            target: target.clone(),
            content_type: header(&headers, "content-type"),
            body: body.clone(),
        });

        let operation = target.rsplit('.').next().unwrap_or_default();
        match operation {
            "GetQueryResults" if body.get("NextToken").is_none() => (
                StatusCode::OK,
                json!({
                    "ResultSet": {"Rows": [
                        {"Data": [{"VarCharValue": "EVENT_LABEL"}, {"VarCharValue": "amount"}]},
                        {"Data": [{"VarCharValue": "fraud"}, {"VarCharValue": "10"}]}
                    ]},
                    "NextToken": "page-2"
                })
                .to_string(),
            ),
            "GetQueryResults" => (
                StatusCode::OK,
                json!({"ResultSet": {"Rows": [
                    {"Data": [{"VarCharValue": "legit"}, {"VarCharValue": "20"}]}
                ]}})
                .to_string(),
            ),
            "PutOutcome" => (StatusCode::OK, String::new()),
            "GetOutcomes" => (
                StatusCode::BAD_REQUEST,
                json!({"__type": "ResourceNotFoundException", "message": "outcome not found"}).to_string(),
            ),
            "GetModelVersion" => (
                StatusCode::BAD_REQUEST,
                json!({
                    "__type": "com.amazonaws.frauddetector#ThrottlingException",
                    "message": "Rate exceeded"
                })
                .to_string(),
            ),
            "CreateRule" => (
                StatusCode::BAD_REQUEST,
                json!({
                    "__type": "ValidationException",
                    "message": "Failed to save rule since it already exists."
                })
                .to_string(),
            ),
            "GetRules" => (
                StatusCode::OK,
                json!({"ruleDetails": [
                    {"ruleId": "rule0_fraud_model", "ruleVersion": "2"},
                    {"ruleId": "rule0_fraud_model", "ruleVersion": "10"},
                    {"ruleId": "rule0_fraud_model", "ruleVersion": "3"}
                ]})
                .to_string(),
            ),
            _ => (StatusCode::NOT_FOUND, String::new()),
        }
    }

    /// Start a local responder and a client pointed at it
    async fn serve() -> (HttpServiceClient, Log) {
        let log = Log::default();
        let app = Router::new().route("/", post(respond)).with_state(log.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let endpoints = ServiceEndpoints {
            fraud_detector: base.clone(),
            athena: base.clone(),
            sagemaker: base,
        };
        let client = HttpServiceClient::new(endpoints, Duration::from_secs(5)).unwrap();
        (client, log)
    }

    fn rule() -> GeneratedRule {
        GeneratedRule {
            rule_id: "rule0_fraud_model".to_string(),
            expression: "$fraud_model_insightscore > 900".to_string(),
            outcome: Outcome::Review,
        }
    }

    #[tokio::test]
    async fn test_query_results_follow_next_token() {
        let (client, log) = serve().await;

        let csv = client.get_query_results("exec-1").await.unwrap();
        assert_eq!(csv, "EVENT_LABEL,amount\nfraud,10\nlegit,20\n");

        let received = log.lock().unwrap().clone();
        assert_eq!(received.len(), 2);
        assert!(received.iter().all(|r| r.target == "AmazonAthena.GetQueryResults"));
        assert!(received.iter().all(|r| r.content_type == JSON_CONTENT_TYPE));
        assert_eq!(received[0].body, json!({"QueryExecutionId": "exec-1"}));
        assert_eq!(
            received[1].body,
            json!({"QueryExecutionId": "exec-1", "NextToken": "page-2"})
        );
    }

    #[tokio::test]
    async fn test_empty_body_is_success() {
        let (client, log) = serve().await;
        client.put_outcome("review", "manual review").await.unwrap();

        let received = log.lock().unwrap().clone();
        assert_eq!(received[0].target, "AWSHawksNestServiceFacade.PutOutcome");
        assert_eq!(received[0].body["name"], "review");
    }

    #[tokio::test]
    async fn test_error_responses_are_classified() {
        let (client, _log) = serve().await;
        let model = ModelVersionRef {
            model_id: "fraud_model".to_string(),
            model_type: crate::types::ModelType::OnlineFraudInsights,
            model_version_number: "1.0".to_string(),
        };

        let err = client.get_model_version(&model).await.unwrap_err();
        assert!(err.is_retryable());

        let err = client.create_rule("signup_detector", &rule()).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(_)));

        assert!(!client.outcome_exists("review").await.unwrap());
    }

    #[tokio::test]
    async fn test_listed_rule_versions_take_highest() {
        let (client, log) = serve().await;

        let version = client.current_rule_version("signup_detector", &rule()).await.unwrap();
        assert_eq!(version, "10");

        let received = log.lock().unwrap().clone();
        assert_eq!(received[0].target, "AWSHawksNestServiceFacade.GetRules");
        assert_eq!(
            received[0].body,
            json!({"detectorId": "signup_detector", "ruleId": "rule0_fraud_model"})
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let client = HttpServiceClient::new(
            ServiceEndpoints {
                fraud_detector: base.clone(),
                athena: base.clone(),
                sagemaker: base,
            },
            Duration::from_secs(5),
        )
        .unwrap();
        let err = client.describe_feature_group("signups").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_throttling_as_transient() {
        let err = classify_error(
            "GetModelVersion",
            400,
            r#"{"__type":"com.amazonaws.frauddetector#ThrottlingException","message":"Rate exceeded"}"#,
        );
        assert!(err.is_retryable());
        assert!(classify_error("GetModelVersion", 503, "").is_retryable());
    }

    #[test]
    fn test_classify_not_found_and_conflict() {
        let err = classify_error(
            "GetOutcomes",
            400,
            r#"{"__type":"ResourceNotFoundException","message":"outcome review not found"}"#,
        );
        assert!(matches!(err, ServiceError::NotFound(_)));

        let err = classify_error(
            "CreateRule",
            400,
            r#"{"__type":"ValidationException","message":"Failed to save rule since it already exists."}"#,
        );
        assert!(matches!(err, ServiceError::AlreadyExists(_)));
    }

    #[test]
    fn test_classify_validation_as_terminal() {
        let err = classify_error(
            "UpdateRuleVersion",
            400,
            r#"{"__type":"ValidationException","Message":"whereas the most recent version is 2."}"#,
        );
        match err {
            ServiceError::Terminal { code, message, .. } => {
                assert_eq!(code, "ValidationException");
                assert!(message.ends_with("is 2."));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rows_to_csv() {
        let response: GetQueryResultsResponse = serde_json::from_str(
            r#"{"ResultSet":{"Rows":[
                {"Data":[{"VarCharValue":"EVENT_LABEL"},{"VarCharValue":"note"}]},
                {"Data":[{"VarCharValue":"fraud"},{"VarCharValue":"a, b"}]},
                {"Data":[{"VarCharValue":"legit"},{}]}
            ]}}"#,
        )
        .unwrap();
        let csv = rows_to_csv("GetQueryResults", &response.result_set.rows).unwrap();
        assert_eq!(csv, "EVENT_LABEL,note\nfraud,\"a, b\"\nlegit,\n");
    }

    #[test]
    fn test_regional_endpoints() {
        let endpoints = ServiceEndpoints::for_region("us-west-2");
        assert_eq!(endpoints.fraud_detector, "https://frauddetector.us-west-2.amazonaws.com");
    }
}
