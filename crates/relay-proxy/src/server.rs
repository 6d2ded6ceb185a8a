//! Proxy listener.
//!
//! `ProxyServer` owns the single listening socket. It is only bound once
//! the backend is healthy, so nothing is accepted before then.

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{ProxyError, ProxyResult};
use crate::proxy::ReverseProxy;

pub struct ProxyServer {
    listener: TcpListener,
    proxy: ReverseProxy,
}

impl ProxyServer {
    /// Bind the listener. Pass port 0 to let the OS choose.
    pub async fn bind(addr: SocketAddr, proxy: ReverseProxy) -> ProxyResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ProxyError::Bind { addr, source })?;
        Ok(Self { listener, proxy })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` fires.
    ///
    /// Spawns a tokio task per connection using HTTP/1.1. Connections
    /// already accepted are left to finish on their own. A failed accept is
    /// logged and the loop keeps going.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> ProxyResult<()> {
        let addr = self.local_addr().map_err(ProxyError::Accept)?;
        info!(%addr, backend = %self.proxy.backend(), "proxy listening");

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    let (stream, peer_addr) = match accept_result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            let pause = accept_backoff(&e);
                            warn!(error = %e, pause_ms = pause.as_millis() as u64, "accept failed");
                            if !pause.is_zero() {
                                tokio::select! {
                                    _ = tokio::time::sleep(pause) => {}
                                    _ = shutdown_requested(&mut shutdown) => break,
                                }
                            }
                            continue;
                        }
                    };
                    let proxy = self.proxy.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let svc = service_fn(move |req: Request<Incoming>| {
                            let proxy = proxy.clone();
                            async move { Ok::<_, Infallible>(proxy.handle(req).await) }
                        });

                        if let Err(e) = http1::Builder::new()
                            .serve_connection(io, svc)
                            .await
                        {
                            debug!(%peer_addr, error = %e, "connection error");
                        }
                    });
                }
                _ = shutdown_requested(&mut shutdown) => {
                    info!("proxy shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// How long to pause after a failed accept.
///
/// Errors tied to a single connection are retried at once. Anything else,
/// such as running out of file descriptors, gets a short pause so the loop
/// does not spin.
fn accept_backoff(err: &io::Error) -> Duration {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::Interrupted => Duration::ZERO,
        _ => Duration::from_millis(100),
    }
}

/// Resolves once `shutdown` is set, or once its sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
