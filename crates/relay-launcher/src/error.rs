//! Launcher error types.

use thiserror::Error;

/// Errors that can occur while managing the child process.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to signal child {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for child: {0}")]
    Wait(#[from] std::io::Error),
}

pub type LaunchResult<T> = Result<T, LaunchError>;
