use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors surfaced by the control plane.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested generator is not in the generator table
    #[error("invalid generator `{0}`")]
    InvalidGenerator(String),
    #[error("tempo must be a positive number of beats per minute, got {0}")]
    InvalidTempo(f64),
    #[error("engine has been shut down")]
    ShutDown,
    #[error("failed to spawn {what} thread")]
    Spawn {
        what: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// A single render cycle failed. Contained to the voice that ran it.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("generator `{generator}` failed: {reason}")]
    Failed { generator: String, reason: String },
    #[error("generator panicked: {0}")]
    Panicked(String),
    #[error("failed to spawn renderer thread")]
    Spawn(#[source] io::Error),
}

impl RenderError {
    pub fn failed(generator: impl Into<String>, reason: impl Into<String>) -> Self {
        RenderError::Failed {
            generator: generator.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no default output device available")]
    NoDevice,
    #[error("audio device error: {0}")]
    Device(String),
    #[error("audio stream closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON in config file {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config file {0} must contain a JSON object")]
    NotAnObject(PathBuf),
    #[error("config does not match the expected schema")]
    Schema(#[source] serde_json::Error),
}
