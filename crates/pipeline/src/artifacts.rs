//! Stage hand-off files
//!
//! Every stage reads its inputs from and writes its outputs to fixed paths
//! under one base directory, the layout of a batch processing container.

use crate::error::PipelineError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const TRAINING_DATA_FILE: &str = "afd_training_data.csv";
pub const SCHEMA_FILE: &str = "schema.json";
pub const SUMMARY_FILE: &str = "summary.json";
pub const TRAIN_RESPONSE_FILE: &str = "train_response.json";
pub const AUC_FILE: &str = "train_auc.json";
pub const ACTIVATION_RESPONSE_FILE: &str = "activation_response.json";

/// Fixed file locations under a base directory
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    base: PathBuf,
}

impl ArtifactLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn output(&self) -> PathBuf {
        self.base.join("output")
    }

    fn input(&self) -> PathBuf {
        self.base.join("input")
    }

    /// Written by create-dataset
    pub fn training_data_out(&self) -> PathBuf {
        self.output().join("train").join(TRAINING_DATA_FILE)
    }

    /// Written by create-dataset and profile
    pub fn schema_out(&self) -> PathBuf {
        self.output().join("schema").join(SCHEMA_FILE)
    }

    /// Read by profile
    pub fn training_data_in(&self) -> PathBuf {
        self.input().join(TRAINING_DATA_FILE)
    }

    pub fn summary_out(&self) -> PathBuf {
        self.output().join("profile").join(SUMMARY_FILE)
    }

    /// Read by train
    pub fn schema_in(&self) -> PathBuf {
        self.base.join("schema").join(SCHEMA_FILE)
    }

    pub fn train_response_out(&self) -> PathBuf {
        self.output().join(TRAIN_RESPONSE_FILE)
    }

    pub fn auc_out(&self) -> PathBuf {
        self.base.join("auc").join(AUC_FILE)
    }

    /// Read by activate
    pub fn train_response_in(&self) -> PathBuf {
        self.input().join(TRAIN_RESPONSE_FILE)
    }

    pub fn activation_response_out(&self) -> PathBuf {
        self.output().join(ACTIVATION_RESPONSE_FILE)
    }

    /// Read by setup-detector
    pub fn activation_response_in(&self) -> PathBuf {
        self.input().join(ACTIVATION_RESPONSE_FILE)
    }
}

fn ensure_parent(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    Ok(())
}

/// Write `value` as JSON, creating parent directories
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PipelineError> {
    ensure_parent(path)?;
    let body = serde_json::to_vec_pretty(value)?;
    fs::write(path, body).map_err(|e| PipelineError::io(path, e))?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Write text, creating parent directories
pub fn write_text(path: &Path, text: &str) -> Result<(), PipelineError> {
    ensure_parent(path)?;
    fs::write(path, text).map_err(|e| PipelineError::io(path, e))?;
    info!("Wrote {} ({} bytes)", path.display(), text.len());
    Ok(())
}

/// Read a JSON artifact left by an earlier stage
///
/// A missing or malformed file is a validation error: the stage cannot start.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    debug!("Loading {}", path.display());
    let body = fs::read(path)
        .map_err(|e| PipelineError::Validation(format!("Unable to load {}: {}", path.display(), e)))?;
    serde_json::from_slice(&body)
        .map_err(|e| PipelineError::Validation(format!("Unable to parse {}: {}", path.display(), e)))
}
