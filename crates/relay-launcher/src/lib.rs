//! relay-launcher — owns the single gateway child process.
//!
//! The child inherits the daemon's stdio so its logs land in the same
//! console. A [`Supervisor`] is the only handle to the child: it watches
//! for exit and, when the shutdown channel fires, sends the child SIGINT
//! and reaps it. A child that outlives the stop timeout is killed.
//!
//! There is no restart policy. A spawn failure is returned to the caller
//! and an unexpected exit is only logged.

pub mod error;
pub mod supervisor;

pub use error::{LaunchError, LaunchResult};
pub use supervisor::{ChildExit, DEFAULT_STOP_TIMEOUT, Supervisor};
