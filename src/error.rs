//! Error types for unyo

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while decoding one snapshot line
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("edge {index} references unknown node {id}")]
    UnknownNode { index: usize, id: u64 },

    #[error("duplicate node id {0}")]
    DuplicateNode(u64),

    #[error("atom {atom} link {port} does not name an atom id")]
    BadLink { atom: u64, port: usize },

    #[error("atom {atom} link {port} points at missing atom {target}")]
    DanglingLink { atom: u64, port: usize, target: u64 },
}

/// Errors raised by a step session
#[derive(Error, Debug)]
pub enum StepError {
    #[error("failed to launch engine {binary}: {source}")]
    ProcessLaunch {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("engine exited after {steps} step(s)")]
    ProcessExited { steps: usize },

    #[error("protocol error at step {step}: {source}")]
    Protocol {
        step: usize,
        #[source]
        source: DecodeError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session is closed")]
    Closed,
}

/// Errors raised while loading or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, StepError>;
