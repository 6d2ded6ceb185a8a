//! relay-proxy — the externally facing HTTP listener.
//!
//! Every inbound request is re-issued against the local backend with the
//! same method, path, headers and body, and the backend's response is
//! streamed back as-is. Bodies are never buffered, so server-sent event
//! streams pass through frame by frame.
//!
//! # Components
//!
//! - **`proxy`** — per-request forwarding and the readiness-probe shortcut
//! - **`server`** — accept loop, one task per connection

pub mod error;
pub mod proxy;
pub mod server;

pub use error::{ProxyError, ProxyResult};
pub use proxy::{ProxyBody, ReverseProxy};
pub use server::ProxyServer;
