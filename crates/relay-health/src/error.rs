//! Health poller error types.

use std::time::Duration;

use thiserror::Error;

use crate::checker::ProbeResult;

/// Errors returned by [`crate::wait_for_server`].
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("invalid health url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("server at {url} not online after {}ms", .timeout.as_millis())]
    Timeout {
        url: String,
        timeout: Duration,
        attempts: u32,
        last: Option<ProbeResult>,
    },
}

pub type HealthResult<T> = Result<T, HealthError>;
