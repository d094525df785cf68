//! Fraud Service Clients
//!
//! Narrow capability traits over the managed fraud detection, query and
//! feature store services, an HTTP implementation, an in-memory simulation
//! and a backoff poller for their long-running operations.

mod client;
mod error;
mod http;
mod memory;
mod poll;
mod types;

pub use client::{
    parse_conflict_version, ConflictMessageResolver, FeatureStore, FraudDetector, QueryEngine,
    RuleVersionResolver, SENTINEL_RULE_VERSION,
};
pub use error::ServiceError;
pub use http::{HttpServiceClient, ServiceEndpoints};
pub use memory::{InMemoryService, StoredRule};
pub use poll::{PollConfig, PollError, PollStep, Poller};
pub use types::*;
