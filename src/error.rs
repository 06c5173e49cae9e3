// ABOUTME: Application-wide error types for stratus.
// ABOUTME: Maps validation failures and apply failures to exit codes.

use crate::graph::CycleError;
use crate::resource::ParseError;
use crate::state::StateError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("apply failed: {failed} resource(s) failed, {blocked} blocked or skipped")]
    ApplyFailed { failed: usize, blocked: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Exit code policy: validation failures that abort before any
    /// change exit 2; apply failures (including partial ones) exit 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::AlreadyExists(_)
            | Error::ConfigNotFound(_)
            | Error::InvalidConfig(_)
            | Error::Parse(_)
            | Error::Cycle(_)
            | Error::Yaml(_) => 2,
            Error::State(_) | Error::ApplyFailed { .. } | Error::Io(_) => 1,
        }
    }
}
