//! Detector setup: outcomes, rules and a new detector version

use crate::error::PipelineError;
use fraud_service::{
    DetectorVersion, DetectorVersionRequest, FraudDetector, ModelVersion, RuleExecutionMode,
    RuleRef, RuleVersionResolver, ServiceError,
};
use rule_generator::{GeneratedRule, Outcome, RuleGenerator};
use tracing::{debug, info};

/// Number of model version details requested when reading training metrics
const DESCRIBE_MAX_RESULTS: u32 = 10;

/// Register every outcome the rules can yield
pub async fn ensure_outcomes<D: FraudDetector>(detector: &D) -> Result<(), PipelineError> {
    for outcome in Outcome::ALL {
        if detector.outcome_exists(outcome.as_str()).await? {
            info!("Outcome {} already exists", outcome);
        } else {
            info!("Creating outcome: {}", outcome);
            detector.put_outcome(outcome.as_str(), outcome.description()).await?;
        }
    }
    Ok(())
}

fn require_expressions(rules: &[GeneratedRule]) -> Result<(), PipelineError> {
    match rules.iter().find(|r| !r.has_expression()) {
        Some(rule) => Err(PipelineError::Validation(format!(
            "Rule {} has no expression",
            rule.rule_id
        ))),
        None => Ok(()),
    }
}

/// Create each rule, or add a version when the rule id is taken
///
/// Stops at the first failure; rules deployed before it are left in place.
pub async fn deploy_rules<D, R>(
    detector: &D,
    resolver: &R,
    detector_id: &str,
    rules: &[GeneratedRule],
) -> Result<Vec<RuleRef>, PipelineError>
where
    D: FraudDetector,
    R: RuleVersionResolver,
{
    require_expressions(rules)?;

    let mut deployed = Vec::with_capacity(rules.len());
    for rule in rules {
        info!(
            "Creating rule: {}: IF {} THEN {}",
            rule.rule_id, rule.expression, rule.outcome
        );
        let reference = match detector.create_rule(detector_id, rule).await {
            Ok(reference) => {
                metrics::counter!("pipeline_rules_deployed_total", "mode" => "created").increment(1);
                reference
            }
            Err(ServiceError::AlreadyExists(_)) => {
                info!("Rule {} already exists in this detector...Updating", rule.rule_id);
                let version = resolver.current_rule_version(detector_id, rule).await?;
                debug!("Rule version for {} is {}", rule.rule_id, version);
                let current = RuleRef {
                    detector_id: detector_id.to_string(),
                    rule_id: rule.rule_id.clone(),
                    rule_version: version,
                };
                let updated = detector.update_rule_version(&current, rule).await?;
                metrics::counter!("pipeline_rules_deployed_total", "mode" => "updated").increment(1);
                updated
            }
            Err(e) => return Err(e.into()),
        };
        deployed.push(reference);
    }
    Ok(deployed)
}

/// Generate rules from the model's training metrics and publish a detector version
pub async fn setup_detector<D, R>(
    detector: &D,
    resolver: &R,
    generator: &RuleGenerator,
    model: &ModelVersion,
    detector_id: &str,
) -> Result<DetectorVersion, PipelineError>
where
    D: FraudDetector,
    R: RuleVersionResolver,
{
    if detector_id.trim().is_empty() {
        return Err(PipelineError::Validation("--detector-name is required".to_string()));
    }

    let reference = model.reference();
    let details = detector
        .describe_model_versions(&reference, DESCRIBE_MAX_RESULTS)
        .await?;
    let points = details
        .first()
        .and_then(|d| d.training_metrics())
        .map(|m| m.metric_data_points.as_slice())
        .ok_or_else(|| PipelineError::MissingMetrics {
            model_id: reference.model_id.clone(),
            version: reference.model_version_number.clone(),
        })?;

    let rules = generator.generate(points, &reference.model_id)?;
    if rules.is_empty() {
        return Err(PipelineError::Validation(format!(
            "No rules could be generated for model {}",
            reference.model_id
        )));
    }
    require_expressions(&rules)?;

    ensure_outcomes(detector).await?;
    let deployed = deploy_rules(detector, resolver, detector_id, &rules).await?;

    let request = DetectorVersionRequest {
        detector_id: detector_id.to_string(),
        rules: deployed,
        model_versions: vec![reference],
        rule_execution_mode: RuleExecutionMode::FirstMatched,
    };
    let version = detector.create_detector_version(&request).await?;
    info!(
        "Detector {} version {} created ({}) with {} rules",
        version.detector_id,
        version.detector_version_id,
        version.status,
        request.rules.len()
    );
    Ok(version)
}
