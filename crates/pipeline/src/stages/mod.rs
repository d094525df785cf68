//! Pipeline stages
//!
//! Each stage is a function over the service capabilities it needs. File
//! hand-off between stages lives in [`crate::Pipeline`].

pub mod activate;
pub mod dataset;
pub mod detector;
pub mod profile;
pub mod train;

pub use activate::{activate, Activation};
pub use dataset::{create_dataset, gen_query, DatasetOutput, DatasetParams, JoinQuery};
pub use detector::{deploy_rules, ensure_outcomes, setup_detector};
pub use profile::profile_csv;
pub use train::{train, AucMetric, TrainOutput, TrainParams};
