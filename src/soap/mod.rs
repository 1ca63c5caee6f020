//! Client for the laboratory provider's XML-over-HTTP result service.

pub mod client;
pub mod dump;
pub mod envelope;
pub mod response;
pub mod scanner;
pub mod types;

pub use client::LabClient;
pub use dump::ArtifactDump;
pub use types::{Artifact, LabGateway, RemoteResult};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Required setting {0} is not configured")]
    MissingSetting(&'static str),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("HTTP {status} with empty body")]
    HttpStatus { status: u16 },
}
