//! Model training

use crate::error::PipelineError;
use feature_profiler::TrainingDataSchema;
use fraud_service::{
    CreateModelVersionRequest, ExternalEventsDetail, FraudDetector, ModelType, ModelVersion,
    ModelVersionStatus, PollStep, Poller, TrainingDataSource,
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::info;

/// Arguments of the train stage
#[derive(Debug, Clone)]
pub struct TrainParams {
    pub model_name: String,
    /// Location of the training CSV in object storage
    pub data_location: String,
    pub data_access_role: String,
}

/// Contents of `train_auc.json`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AucMetric {
    pub auc_metric: f64,
}

#[derive(Debug, Clone)]
pub struct TrainOutput {
    pub model_version: ModelVersion,
    pub auc: AucMetric,
}

/// Train a model version on `schema` and wait for training to finish
pub async fn train<D: FraudDetector>(
    detector: &D,
    poller: &Poller,
    schema: TrainingDataSchema,
    params: &TrainParams,
) -> Result<TrainOutput, PipelineError> {
    for (flag, value) in [
        ("model-name", &params.model_name),
        ("s3-file-loc", &params.data_location),
        ("data-access-role", &params.data_access_role),
    ] {
        if value.trim().is_empty() {
            return Err(PipelineError::Validation(format!("--{} is required", flag)));
        }
    }
    if schema.model_variables.is_empty() {
        return Err(PipelineError::Validation(
            "Training schema has no model variables".to_string(),
        ));
    }

    info!("Attempting to train model {}", params.model_name);
    let request = CreateModelVersionRequest {
        model_id: params.model_name.clone(),
        model_type: ModelType::OnlineFraudInsights,
        training_data_source: TrainingDataSource::ExternalEvents,
        training_data_schema: schema,
        external_events_detail: ExternalEventsDetail {
            data_location: params.data_location.clone(),
            data_access_role_arn: params.data_access_role.clone(),
        },
    };
    let reference = detector.create_model_version(&request).await?;

    let start = Instant::now();
    let model = &reference;
    let version = poller
        .until("model training", move || async move {
            let version = detector.get_model_version(model).await?;
            if version.status == ModelVersionStatus::TrainingInProgress {
                Ok(PollStep::Pending(version.status.to_string()))
            } else {
                Ok(PollStep::Done(version))
            }
        })
        .await?;
    info!(
        "Model status: {}. Elapsed time: {:.0} seconds",
        version.status,
        start.elapsed().as_secs_f64()
    );

    if version.status != ModelVersionStatus::TrainingComplete {
        return Err(PipelineError::UnexpectedStatus {
            what: format!("Training of model {}", params.model_name),
            status: version.status.to_string(),
        });
    }

    let details = detector.describe_model_versions(&reference, 1).await?;
    let auc = details
        .first()
        .and_then(|d| d.training_metrics())
        .and_then(|m| m.auc)
        .ok_or_else(|| PipelineError::MissingMetrics {
            model_id: reference.model_id.clone(),
            version: reference.model_version_number.clone(),
        })?;
    info!("Model {} AUC: {:.4}", params.model_name, auc);

    Ok(TrainOutput {
        model_version: version,
        auc: AucMetric { auc_metric: auc },
    })
}
