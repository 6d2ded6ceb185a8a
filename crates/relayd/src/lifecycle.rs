//! Shutdown coordination.
//!
//! `Lifecycle` owns the shutdown channel and the task supervising the
//! gateway child. Signal handlers and the startup path hold a
//! [`ShutdownTrigger`]; firing it makes the supervisor SIGINT the child and
//! makes the proxy stop accepting.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use relay_launcher::{ChildExit, LaunchResult, Supervisor};

/// Why the relay is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// SIGINT.
    Interrupt,
    /// The platform is aborting the run (delivered as SIGTERM).
    Aborting,
    /// The daemon is leaving its main path on its own.
    Exit,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleEvent::Interrupt => "interrupt",
            LifecycleEvent::Aborting => "aborting",
            LifecycleEvent::Exit => "exit",
        })
    }
}

/// Cloneable handle that requests shutdown.
#[derive(Clone, Debug)]
pub struct ShutdownTrigger(Arc<watch::Sender<bool>>);

impl ShutdownTrigger {
    pub fn fire(&self, event: LifecycleEvent) {
        let already = self.0.send_replace(true);
        if already {
            debug!(%event, "shutdown already in progress");
        } else {
            info!(%event, "shutdown requested");
        }
    }

    pub fn is_fired(&self) -> bool {
        *self.0.borrow()
    }
}

pub struct Lifecycle {
    trigger: ShutdownTrigger,
    shutdown_rx: watch::Receiver<bool>,
    supervisor: Option<JoinHandle<LaunchResult<ChildExit>>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            trigger: ShutdownTrigger(Arc::new(tx)),
            shutdown_rx: rx,
            supervisor: None,
        }
    }

    pub fn trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Resolves once shutdown has been requested.
    pub async fn stopped(&self) {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|stop| *stop).await;
    }

    /// Hand the child over; it is SIGINTed when shutdown fires.
    ///
    /// Panics if a child is already being supervised.
    pub fn supervise(&mut self, supervisor: Supervisor) {
        assert!(self.supervisor.is_none(), "only one child process may be supervised");
        let rx = self.subscribe();
        self.supervisor = Some(tokio::spawn(supervisor.run(rx)));
    }

    /// Translate SIGINT and SIGTERM into shutdown requests.
    pub fn listen_for_signals(&self) -> std::io::Result<()> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let trigger = self.trigger();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = interrupt.recv() => LifecycleEvent::Interrupt,
                    _ = terminate.recv() => LifecycleEvent::Aborting,
                };
                trigger.fire(event);
            }
        });
        Ok(())
    }

    /// Request shutdown and wait for the child to be reaped.
    ///
    /// Bounded by the supervisor's stop timeout, after which the child is
    /// killed.
    pub async fn finish(mut self, event: LifecycleEvent) -> Option<ChildExit> {
        self.trigger.fire(event);

        let handle = self.supervisor.take()?;
        match handle.await {
            Ok(Ok(exit)) => Some(exit),
            Ok(Err(e)) => {
                error!(error = %e, "failed to stop child process");
                None
            }
            Err(e) => {
                warn!(error = %e, "supervisor task failed");
                None
            }
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
