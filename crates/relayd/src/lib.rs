//! relayd — supervises an MCP gateway process and proxies traffic to it.
//!
//! ```text
//! App::run
//!   ├── standby-mode gate (PlatformEnv)
//!   ├── Supervisor::spawn → Lifecycle::supervise
//!   ├── wait_for_server(health_url, timeout, interval)
//!   └── ProxyServer::serve until the shutdown trigger fires
//! ```

pub mod app;
pub mod lifecycle;

pub use app::App;
pub use lifecycle::{Lifecycle, LifecycleEvent, ShutdownTrigger};

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str =
    "info,relayd=debug,relay_core=debug,relay_launcher=debug,relay_health=debug,relay_proxy=debug";
