//! Fraud Model Pipeline
//!
//! Builds a training dataset from two feature groups, profiles it, trains and
//! activates a fraud model, then publishes detector rules derived from the
//! model's score thresholds. Stages hand off through files under one base
//! directory so each can run as a separate batch job.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod stages;

pub use artifacts::ArtifactLayout;
pub use crate::config::{PipelineConfig, RuleVersionStrategy};
pub use error::PipelineError;

use feature_profiler::{Profile, TrainingDataSchema};
use fraud_service::{
    DetectorVersion, FeatureStore, FraudDetector, ModelVersion, Poller, QueryEngine,
    RuleVersionResolver,
};
use rule_generator::RuleGenerator;
use stages::{Activation, DatasetOutput, DatasetParams, TrainOutput, TrainParams};
use std::path::Path;
use tracing::info;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber
///
/// The filter comes from `RUST_LOG`, defaulting to `info`.
pub fn init_logging(json: bool) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    }
}

/// Arguments of a full in-process run
#[derive(Debug, Clone)]
pub struct RunParams {
    pub dataset: DatasetParams,
    pub train: TrainParams,
    pub detector_name: String,
}

/// Runs stages against one service and one artifact directory
pub struct Pipeline<'a, S> {
    service: &'a S,
    layout: ArtifactLayout,
    config: PipelineConfig,
}

impl<'a, S> Pipeline<'a, S> {
    pub fn new(service: &'a S, config: PipelineConfig) -> Self {
        Self {
            service,
            layout: ArtifactLayout::new(config.paths.base_dir.clone()),
            config,
        }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    fn model_poller(&self) -> Poller {
        Poller::new(self.config.polling.model.clone())
    }

    fn query_poller(&self) -> Poller {
        Poller::new(self.config.polling.query.clone())
    }

    /// Profile `input`, or the staged training data when not given
    pub fn profile(&self, input: Option<&Path>) -> Result<Profile, PipelineError> {
        let default_input = self.layout.training_data_in();
        let input = input.unwrap_or(default_input.as_path());
        let profile = stages::profile_csv(input, &self.config.profiler)?;
        artifacts::write_json(&self.layout.summary_out(), &profile.summaries)?;
        artifacts::write_json(&self.layout.schema_out(), &profile.schema)?;
        Ok(profile)
    }
}

impl<'a, S> Pipeline<'a, S>
where
    S: FraudDetector + QueryEngine + FeatureStore,
{
    pub async fn create_dataset(&self, params: &DatasetParams) -> Result<DatasetOutput, PipelineError> {
        let output = stages::create_dataset(self.service, &self.query_poller(), params).await?;
        artifacts::write_text(&self.layout.training_data_out(), &output.csv)?;
        artifacts::write_json(&self.layout.schema_out(), &output.schema)?;
        Ok(output)
    }

    /// Train on the staged schema file
    pub async fn train(&self, params: &TrainParams) -> Result<TrainOutput, PipelineError> {
        info!("Attempting to load training schema file");
        let schema: TrainingDataSchema = artifacts::read_json(&self.layout.schema_in())?;
        self.train_with_schema(schema, params).await
    }

    pub async fn train_with_schema(
        &self,
        schema: TrainingDataSchema,
        params: &TrainParams,
    ) -> Result<TrainOutput, PipelineError> {
        let output = stages::train(self.service, &self.model_poller(), schema, params).await?;
        artifacts::write_json(&self.layout.train_response_out(), &output.model_version)?;
        artifacts::write_json(&self.layout.auc_out(), &output.auc)?;
        Ok(output)
    }

    /// Activate the model named by the staged training response
    pub async fn activate(&self) -> Result<Activation, PipelineError> {
        let trained: ModelVersion = artifacts::read_json(&self.layout.train_response_in())?;
        self.activate_model(&trained).await
    }

    pub async fn activate_model(&self, trained: &ModelVersion) -> Result<Activation, PipelineError> {
        let activation = stages::activate(self.service, &self.model_poller(), trained).await?;
        if let Activation::Activated(version) = &activation {
            artifacts::write_json(&self.layout.activation_response_out(), version)?;
        }
        Ok(activation)
    }

    /// Publish rules for the model named by the staged activation response
    pub async fn setup_detector<R: RuleVersionResolver>(
        &self,
        resolver: &R,
        detector_name: &str,
    ) -> Result<DetectorVersion, PipelineError> {
        let model: ModelVersion = artifacts::read_json(&self.layout.activation_response_in())?;
        self.setup_detector_for(resolver, &model, detector_name).await
    }

    pub async fn setup_detector_for<R: RuleVersionResolver>(
        &self,
        resolver: &R,
        model: &ModelVersion,
        detector_name: &str,
    ) -> Result<DetectorVersion, PipelineError> {
        let generator = RuleGenerator::new(self.config.rules.clone());
        stages::setup_detector(self.service, resolver, &generator, model, detector_name).await
    }

    /// Every service stage in sequence, handing results over in memory
    pub async fn run<R: RuleVersionResolver>(
        &self,
        resolver: &R,
        params: &RunParams,
    ) -> Result<DetectorVersion, PipelineError> {
        let dataset = self.create_dataset(&params.dataset).await?;
        let trained = self.train_with_schema(dataset.schema, &params.train).await?;
        let activation = self.activate_model(&trained.model_version).await?;
        let model = match activation {
            Activation::Activated(version) => version,
            Activation::AlreadyActive => trained.model_version,
        };
        self.setup_detector_for(resolver, &model, &params.detector_name)
            .await
    }
}
