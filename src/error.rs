//! Error types. Which of these a failure lands in decides how far it travels:
//! [`SampleError`] and [`DeliveryError`] stay inside the task that hit them,
//! [`ConfigError`] sends the supervisor back around its reload loop, and
//! [`ValidationError`] stops the process.

use std::{path::PathBuf, process::ExitStatus};

/// The configuration could not be read, or the destination it names could not
/// be reached. Recoverable: the supervisor retries.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid YAML, or has the wrong shape.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The statsd destination could not be resolved or connected.
    #[error("failed to connect to statsd at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// The configuration was read, but describes something we cannot run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("item '{item}': unknown sampler type '{kind}'")]
    UnknownSampler { item: String, kind: String },

    #[error("item '{item}': unknown metric type '{kind}'")]
    UnknownMetric { item: String, kind: String },

    #[error("item '{item}': interval must be greater than zero")]
    ZeroInterval { item: String },
}

/// A single poll of a sampler failed. The tick is skipped.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse '{text}' as an integer")]
    Parse { text: String },

    #[error("failed to run command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command '{command}' exited with {status}: {stderr}")]
    Exec {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("no line for '{name}' in {path}")]
    NotFound { name: String, path: PathBuf },

    #[error("{path} is missing field '{field}'")]
    MissingField { field: &'static str, path: PathBuf },

    #[error("unexpected contents of {path}: {detail}")]
    Format { path: PathBuf, detail: String },
}

impl SampleError {
    /// Short, stable name of the failure, used as a metric label.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Parse { .. } => "parse",
            Self::Spawn { .. } | Self::Exec { .. } => "exec",
            Self::NotFound { .. } => "not_found",
            Self::MissingField { .. } => "missing_field",
            Self::Format { .. } => "format",
        }
    }
}

/// A sample could not be delivered. The sample is dropped.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("failed to write datagram: {0}")]
    Write(#[from] std::io::Error),

    #[error("sender is closed")]
    Closed,
}

/// Errors that escape the supervisor.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
