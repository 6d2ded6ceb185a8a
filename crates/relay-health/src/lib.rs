//! relay-health — startup readiness polling for the backend.
//!
//! `wait_for_server` issues a `GET` against the health URL every
//! `interval` until one answers `200 OK` or the `timeout` budget runs out.
//! Connection errors and non-200 answers both mean "not ready yet"; they
//! are classified as a [`ProbeResult`] only for logging and for the
//! timeout error.

pub mod checker;
pub mod error;

pub use checker::{probe, wait_for_server, PollReport, ProbeResult};
pub use error::{HealthError, HealthResult};
