//! Health probe and the bounded polling loop.

use std::time::Duration;

use http::{StatusCode, Uri};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{HealthError, HealthResult};

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The health endpoint returned 200.
    Healthy,
    /// The health endpoint answered with any other status.
    Unhealthy(StatusCode),
    /// The probe could not be executed (connection error or timeout).
    Failed,
}

/// Outcome of a successful [`wait_for_server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    /// Number of probes issued, including the successful one.
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Perform one HTTP `GET` against `uri`, giving up after `timeout`.
pub async fn probe(uri: &Uri, timeout: Duration) -> ProbeResult {
    let Some(authority) = uri.authority() else {
        return ProbeResult::Failed;
    };
    let address = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));

    let result = tokio::time::timeout(timeout, async {
        let stream = match tokio::net::TcpStream::connect(&address).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, %uri, "health probe connection failed");
                return ProbeResult::Failed;
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, %uri, "health probe handshake failed");
                return ProbeResult::Failed;
            }
        };

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
        let req = match http::Request::builder()
            .method(http::Method::GET)
            .uri(path)
            .header(http::header::HOST, authority.as_str())
            .header(http::header::USER_AGENT, "relay-health/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => {
                debug!(error = %e, %uri, "health probe request invalid");
                return ProbeResult::Failed;
            }
        };

        match sender.send_request(req).await {
            Ok(resp) if resp.status() == StatusCode::OK => ProbeResult::Healthy,
            Ok(resp) => {
                debug!(status = %resp.status(), %uri, "health probe not ok");
                ProbeResult::Unhealthy(resp.status())
            }
            Err(e) => {
                debug!(error = %e, %uri, "health probe request failed");
                ProbeResult::Failed
            }
        }
    })
    .await;

    match result {
        Ok(probe) => probe,
        Err(_) => {
            debug!(%uri, "health probe timed out");
            ProbeResult::Failed
        }
    }
}

/// Poll `url` until it answers 200, sleeping `interval` between probes.
///
/// Fails with [`HealthError::Timeout`] once `timeout` has elapsed without a
/// healthy answer. No probe is started after the budget is spent, and each
/// probe is cut off at the remaining budget.
pub async fn wait_for_server(
    url: &str,
    timeout: Duration,
    interval: Duration,
) -> HealthResult<PollReport> {
    let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| HealthError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if uri.authority().is_none() {
        return Err(HealthError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".to_string(),
        });
    }

    let start = Instant::now();
    let mut attempts = 0;
    let mut last = None;

    while start.elapsed() < timeout {
        attempts += 1;
        let remaining = timeout.saturating_sub(start.elapsed());

        match probe(&uri, remaining).await {
            ProbeResult::Healthy => {
                let elapsed = start.elapsed();
                info!(%url, attempts, elapsed_ms = elapsed.as_millis() as u64, "server is online");
                return Ok(PollReport { attempts, elapsed });
            }
            result => {
                debug!(%url, attempt = attempts, ?result, "server not ready yet");
                last = Some(result);
            }
        }

        tokio::time::sleep(interval).await;
    }

    Err(HealthError::Timeout {
        url: url.to_string(),
        timeout,
        attempts,
        last,
    })
}
