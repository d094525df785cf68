//! Fraud Pipeline - Main Entry Point

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use fraud_service::{ConflictMessageResolver, HttpServiceClient};
use pipeline::stages::{Activation, DatasetParams, TrainParams};
use pipeline::{
    init_logging, Pipeline, PipelineConfig, PipelineError, RuleVersionStrategy, RunParams,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

/// Train a fraud model on feature store data and publish detector rules
#[derive(Parser, Debug)]
#[command(name = "fraud-pipeline", version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "FRAUD_PIPELINE_CONFIG")]
    config: Option<PathBuf>,

    /// Service region (overrides the configuration)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Root of the stage input/output directories (overrides the configuration)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Join the signups and outcomes feature groups into a training dataset
    CreateDataset(DatasetArgs),

    /// Profile a training CSV and write its summary and schema
    Profile {
        /// CSV to profile (default: input/afd_training_data.csv)
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Train a model version on the staged schema
    Train(TrainArgs),

    /// Activate the trained model version
    Activate,

    /// Create outcomes and rules, then a detector version
    SetupDetector(DetectorArgs),

    /// Run create-dataset, train, activate and setup-detector in one process
    Run {
        #[command(flatten)]
        dataset: DatasetArgs,
        #[command(flatten)]
        train: TrainArgs,
        #[command(flatten)]
        detector: DetectorArgs,
    },
}

#[derive(Args, Debug)]
struct DatasetArgs {
    #[arg(long)]
    signups_feature_group_name: String,
    #[arg(long)]
    outcomes_feature_group_name: String,
    #[arg(long)]
    bucket_name: String,
    #[arg(long, default_value = "")]
    bucket_prefix: String,
}

impl From<DatasetArgs> for DatasetParams {
    fn from(args: DatasetArgs) -> Self {
        Self {
            signups_feature_group: args.signups_feature_group_name,
            outcomes_feature_group: args.outcomes_feature_group_name,
            bucket_name: args.bucket_name,
            bucket_prefix: args.bucket_prefix,
        }
    }
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Role the service assumes to read the training data
    #[arg(long)]
    data_access_role: String,
    #[arg(long)]
    model_name: String,
    /// Object storage location of the training CSV
    #[arg(long)]
    s3_file_loc: String,
}

impl From<TrainArgs> for TrainParams {
    fn from(args: TrainArgs) -> Self {
        Self {
            model_name: args.model_name,
            data_location: args.s3_file_loc,
            data_access_role: args.data_access_role,
        }
    }
}

#[derive(Args, Debug)]
struct DetectorArgs {
    #[arg(long)]
    detector_name: String,
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(region) = &cli.region {
        config.service.region = region.clone();
    }
    if let Some(base_dir) = &cli.base_dir {
        config.paths.base_dir = base_dir.clone();
    }
    Ok(config)
}

async fn execute(command: Command, config: PipelineConfig) -> Result<()> {
    let client = HttpServiceClient::new(config.service.endpoints(), config.service.request_timeout())?;
    let strategy = config.service.rule_version_strategy;
    let pipeline = Pipeline::new(&client, config);
    info!("Artifacts under {}", pipeline.layout().base().display());

    match command {
        Command::CreateDataset(args) => {
            let output = pipeline.create_dataset(&args.into()).await?;
            info!("Training dataset and schema generated: {:?}", output.schema);
        }
        Command::Profile { input } => {
            let profile = pipeline.profile(input.as_deref())?;
            info!(
                "Model variables: {:?}, labels: {:?}",
                profile.model_variables, profile.event_labels
            );
        }
        Command::Train(args) => {
            let output = pipeline.train(&args.into()).await?;
            info!(
                "Model {} version {} trained, AUC {:.4}",
                output.model_version.model_id,
                output.model_version.model_version_number,
                output.auc.auc_metric
            );
        }
        Command::Activate => match pipeline.activate().await? {
            Activation::Activated(version) => info!("Model {} is {}", version.model_id, version.status),
            Activation::AlreadyActive => info!("Nothing to activate"),
        },
        Command::SetupDetector(args) => {
            let version = match strategy {
                RuleVersionStrategy::ConflictMessage => {
                    let resolver = ConflictMessageResolver::new(&client);
                    pipeline.setup_detector(&resolver, &args.detector_name).await?
                }
                RuleVersionStrategy::GetRules => pipeline.setup_detector(&client, &args.detector_name).await?,
            };
            info!("Detector version: {:?}", version);
        }
        Command::Run { dataset, train, detector } => {
            let params = RunParams {
                dataset: dataset.into(),
                train: train.into(),
                detector_name: detector.detector_name,
            };
            let version = match strategy {
                RuleVersionStrategy::ConflictMessage => {
                    let resolver = ConflictMessageResolver::new(&client);
                    pipeline.run(&resolver, &params).await?
                }
                RuleVersionStrategy::GetRules => pipeline.run(&client, &params).await?,
            };
            info!("Pipeline complete: detector version {:?}", version);
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    info!("=== Fraud Pipeline v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Region: {}", config.service.region);

    tokio::select! {
        result = execute(cli.command, config) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; abandoning the current stage");
            Err(anyhow!("interrupted"))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.log_json) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            if e.downcast_ref::<PipelineError>().is_some_and(PipelineError::is_retryable) {
                warn!("The failure is transient; rerunning the stage may succeed");
            }
            ExitCode::FAILURE
        }
    }
}
