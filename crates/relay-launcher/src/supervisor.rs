//! Child process supervision.

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::{LaunchError, LaunchResult};

/// How the child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    /// Exit code, if the child exited normally.
    pub code: Option<i32>,
    /// Terminating signal, if the child was killed by one.
    pub signal: Option<i32>,
}

impl From<ExitStatus> for ChildExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown status"),
        }
    }
}

/// How long a SIGINTed child gets to exit before it is killed.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Owner of the single gateway child process.
#[derive(Debug)]
pub struct Supervisor {
    program: String,
    child: Child,
    stop_timeout: Duration,
}

impl Supervisor {
    /// Spawn `program` with `args`, inheriting stdin, stdout and stderr.
    pub fn spawn<I, S>(program: &str, args: I) -> LaunchResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| {
                error!(%program, error = %source, "child process error");
                LaunchError::Spawn {
                    program: program.to_string(),
                    source,
                }
            })?;

        info!(%program, pid = ?child.id(), "child process spawned");
        Ok(Self {
            program: program.to_string(),
            child,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        })
    }

    /// Grace period between SIGINT and SIGKILL on shutdown.
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    /// OS pid of the child, or `None` once it has been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Send SIGINT so the child can shut down gracefully.
    ///
    /// A child that has already exited is left alone.
    pub fn terminate(&mut self) -> LaunchResult<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        let Some(pid) = self.child.id() else {
            return Ok(());
        };

        info!(program = %self.program, pid, "sending SIGINT to child process");
        // SAFETY: kill(2) has no memory-safety preconditions; the pid belongs
        // to a child we have not reaped yet.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ESRCH) {
                return Ok(());
            }
            return Err(LaunchError::Signal { pid, source: err });
        }
        Ok(())
    }

    /// Supervise the child until it exits or `shutdown` fires.
    ///
    /// On shutdown the child is sent SIGINT and reaped before returning. A
    /// child still running after the stop timeout is killed.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> LaunchResult<ChildExit> {
        tokio::select! {
            status = self.child.wait() => {
                let exit = ChildExit::from(status?);
                warn!(program = %self.program, %exit, "child process exited");
                return Ok(exit);
            }
            _ = shutdown_requested(&mut shutdown) => {}
        }

        info!("cleaning up before exit");
        let exit = self.stop().await?;
        info!(program = %self.program, %exit, "child process exited");
        Ok(exit)
    }

    async fn stop(&mut self) -> LaunchResult<ChildExit> {
        self.terminate()?;
        match tokio::time::timeout(self.stop_timeout, self.child.wait()).await {
            Ok(status) => Ok(ChildExit::from(status?)),
            Err(_) => {
                warn!(
                    program = %self.program,
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "child ignored SIGINT, killing it"
                );
                self.child.kill().await?;
                Ok(ChildExit::from(self.child.wait().await?))
            }
        }
    }
}

/// Resolves once `shutdown` is set, or once its sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn exit_display() {
        let exit = ChildExit { code: Some(3), signal: None };
        assert_eq!(exit.to_string(), "exit code 3");
        let exit = ChildExit { code: None, signal: Some(libc::SIGINT) };
        assert_eq!(exit.to_string(), format!("signal {}", libc::SIGINT));
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let err = Supervisor::spawn("relay-test-no-such-binary", ["--help"]).unwrap_err();
        match err {
            LaunchError::Spawn { program, source } => {
                assert_eq!(program, "relay-test-no-such-binary");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unexpected_exit_reports_code() {
        let supervisor = Supervisor::spawn("sh", ["-c", "exit 3"]).unwrap();
        let (_tx, rx) = watch::channel(false);

        let exit = tokio::time::timeout(Duration::from_secs(5), supervisor.run(rx))
            .await
            .expect("child should exit on its own")
            .unwrap();
        assert_eq!(exit.code, Some(3));
    }

    #[tokio::test]
    async fn shutdown_interrupts_child() {
        let supervisor = Supervisor::spawn("sleep", ["30"]).unwrap();
        assert!(supervisor.pid().is_some());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(supervisor.run(rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        let exit = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("child should stop after SIGINT")
            .unwrap()
            .unwrap();
        assert_eq!(exit.signal, Some(libc::SIGINT));
    }

    #[tokio::test]
    async fn shutdown_already_requested_stops_immediately() {
        let supervisor = Supervisor::spawn("sleep", ["30"]).unwrap();
        let (_tx, rx) = watch::channel(true);

        let exit = tokio::time::timeout(Duration::from_secs(5), supervisor.run(rx))
            .await
            .expect("child should stop after SIGINT")
            .unwrap();
        assert_eq!(exit.code, None);
    }

    #[tokio::test]
    async fn child_ignoring_sigint_is_killed_after_stop_timeout() {
        let supervisor = Supervisor::spawn("sh", ["-c", "trap '' INT; exec sleep 30"])
            .unwrap()
            .with_stop_timeout(Duration::from_millis(200));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(supervisor.run(rx));
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();

        let exit = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("child should be killed once the stop timeout passes")
            .unwrap()
            .unwrap();
        assert_eq!(exit.signal, Some(libc::SIGKILL));
    }

    #[tokio::test]
    async fn terminate_after_exit_is_noop() {
        let mut supervisor = Supervisor::spawn("true", std::iter::empty::<&str>()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        supervisor.terminate().unwrap();
        supervisor.terminate().unwrap();
    }
}
