pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

pub use config::{GroundingConfig, SessionConfig};
pub use error::{Error, Result};
pub use metrics::{Metrics, Operation, Usage};
pub use types::{
    ActOptions, ActResult, ExtractOptions, ExtractResult, GroundedElement, ObserveOptions,
    ObserveResult,
};
