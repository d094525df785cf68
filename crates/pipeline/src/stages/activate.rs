//! Model activation

use crate::error::PipelineError;
use fraud_service::{FraudDetector, ModelVersion, ModelVersionStatus, PollStep, Poller};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    /// The model was activated; carries the final model version
    Activated(ModelVersion),
    /// Nothing to do
    AlreadyActive,
}

fn activation_pending(status: &ModelVersionStatus) -> bool {
    matches!(
        status,
        ModelVersionStatus::TrainingComplete
            | ModelVersionStatus::ActivateRequested
            | ModelVersionStatus::ActivateInProgress
    )
}

/// Activate a trained model version and wait until it is live
pub async fn activate<D: FraudDetector>(
    detector: &D,
    poller: &Poller,
    trained: &ModelVersion,
) -> Result<Activation, PipelineError> {
    let reference = trained.reference();
    match trained.status {
        ModelVersionStatus::TrainingComplete => {}
        ModelVersionStatus::Active => {
            info!(
                "Model {} version {} already {}",
                reference.model_id, reference.model_version_number, trained.status
            );
            return Ok(Activation::AlreadyActive);
        }
        ref other => {
            return Err(PipelineError::UnexpectedStatus {
                what: format!(
                    "Model {} version {}",
                    reference.model_id, reference.model_version_number
                ),
                status: other.to_string(),
            });
        }
    }

    detector
        .update_model_version_status(&reference, ModelVersionStatus::Active)
        .await?;
    info!("Activating model {}...", reference.model_id);

    let model = &reference;
    let version = poller
        .until("model activation", move || async move {
            let version = detector.get_model_version(model).await?;
            if activation_pending(&version.status) {
                Ok(PollStep::Pending(version.status.to_string()))
            } else {
                Ok(PollStep::Done(version))
            }
        })
        .await?;

    if version.status != ModelVersionStatus::Active {
        return Err(PipelineError::UnexpectedStatus {
            what: format!("Activation of model {}", reference.model_id),
            status: version.status.to_string(),
        });
    }
    info!("Model status: {}", version.status);
    Ok(Activation::Activated(version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraud_service::{InMemoryService, ModelType, PollConfig};

    fn trained(status: ModelVersionStatus) -> ModelVersion {
        ModelVersion {
            model_id: "fraud_model".to_string(),
            model_type: ModelType::OnlineFraudInsights,
            model_version_number: "1.0".to_string(),
            status,
            training_data_source: None,
            training_data_schema: None,
            external_events_detail: None,
            arn: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_activates_trained_model() {
        let model = trained(ModelVersionStatus::TrainingComplete);
        let service = InMemoryService::new()
            .with_model_version(model.clone())
            .with_activation(3, ModelVersionStatus::Active);
        let poller = Poller::new(PollConfig::model());

        match activate(&service, &poller, &model).await.unwrap() {
            Activation::Activated(version) => assert_eq!(version.status, ModelVersionStatus::Active),
            other => panic!("expected activation, got {:?}", other),
        }
        assert_eq!(
            service.model_version("fraud_model", "1.0").unwrap().status,
            ModelVersionStatus::Active
        );
    }

    #[tokio::test]
    async fn test_already_active() {
        let model = trained(ModelVersionStatus::Active);
        let service = InMemoryService::new();
        let poller = Poller::new(PollConfig::model());
        assert_eq!(
            activate(&service, &poller, &model).await.unwrap(),
            Activation::AlreadyActive
        );
    }

    #[tokio::test]
    async fn test_untrained_model_is_rejected() {
        let model = trained(ModelVersionStatus::TrainingInProgress);
        let service = InMemoryService::new();
        let poller = Poller::new(PollConfig::model());
        assert!(matches!(
            activate(&service, &poller, &model).await,
            Err(PipelineError::UnexpectedStatus { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_stops_waiting() {
        let model = trained(ModelVersionStatus::TrainingComplete);
        let service = InMemoryService::new()
            .with_model_version(model.clone())
            .with_activation(2, ModelVersionStatus::Error);
        let poller = Poller::new(PollConfig::model());

        match activate(&service, &poller, &model).await {
            Err(PipelineError::UnexpectedStatus { status, .. }) => assert_eq!(status, "ERROR"),
            other => panic!("expected activation failure, got {:?}", other),
        }
    }
}
