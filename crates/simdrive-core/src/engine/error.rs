use std::io;
use std::time::Duration;
use thiserror::Error;

use super::config::ConfigError;
use super::observable::Engine;
use crate::core::io::FormatError;
use crate::core::models::protocol::{ProtocolError, ProtocolKind};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{engine} does not support the {protocol} protocol{}", .detail.as_ref().map(|d| format!(" ({})", d)).unwrap_or_default())]
    UnsupportedProtocol {
        engine: Engine,
        protocol: ProtocolKind,
        detail: Option<String>,
    },

    #[error("Could not find an executable for {engine} (tried: {tried})")]
    MissingExecutable { engine: Engine, tried: String },

    #[error("Invalid restraint: {0}")]
    InvalidRestraint(String),

    #[error("{purpose} failed with exit code {}: {command}\n{stderr}", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    ExternalTool {
        purpose: &'static str,
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Process did not finish within {0:?}")]
    Timeout(Duration),

    #[error("The process has not been started")]
    NotStarted,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid input file: {0}")]
    Format(#[from] FormatError),

    #[error("Invalid protocol: {0}")]
    Protocol(#[from] ProtocolError),
}

impl EngineError {
    pub(crate) fn unsupported(engine: Engine, protocol: ProtocolKind) -> Self {
        Self::UnsupportedProtocol {
            engine,
            protocol,
            detail: None,
        }
    }

    pub(crate) fn unsupported_because(
        engine: Engine,
        protocol: ProtocolKind,
        detail: impl Into<String>,
    ) -> Self {
        Self::UnsupportedProtocol {
            engine,
            protocol,
            detail: Some(detail.into()),
        }
    }
}
