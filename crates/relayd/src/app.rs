//! Startup sequence: gate on standby mode, launch the gateway, wait for it
//! to report healthy, then proxy until shutdown.

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, bail};
use tracing::{error, info};

use relay_core::{PlatformEnv, RelayConfig};
use relay_health::wait_for_server;
use relay_launcher::Supervisor;
use relay_proxy::{ProxyServer, ReverseProxy};

use crate::lifecycle::{Lifecycle, LifecycleEvent};

pub struct App {
    config: RelayConfig,
    platform: PlatformEnv,
}

impl App {
    pub fn new(config: RelayConfig, platform: PlatformEnv) -> Self {
        Self { config, platform }
    }

    /// Address the proxy listens on once the backend is up.
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .config
            .proxy
            .bind_address
            .parse()
            .with_context(|| format!("invalid bind address {:?}", self.config.proxy.bind_address))?;
        let port = self.config.proxy.port.unwrap_or(self.platform.standby_port);
        Ok(SocketAddr::new(ip, port))
    }

    /// Run until shutdown is requested through `lifecycle`.
    ///
    /// Whatever happens after the child is spawned, it is sent SIGINT and
    /// reaped before this returns.
    pub async fn run(self, mut lifecycle: Lifecycle) -> anyhow::Result<()> {
        if !self.platform.is_standby() {
            error!(
                meta_origin = ?self.platform.meta_origin,
                "relay is not meant to be run directly; it must run in standby mode"
            );
            bail!("not running in standby mode");
        }

        let bind_addr = self.bind_addr()?;
        let gateway = &self.config.gateway;
        let proxy = ReverseProxy::new(
            &gateway.backend_authority(),
            &self.config.proxy.readiness_probe_header,
        )?;

        let supervisor = Supervisor::spawn(&gateway.program, gateway.args())?
            .with_stop_timeout(gateway.stop_timeout);
        lifecycle.supervise(supervisor);

        let outcome = self.serve(&lifecycle, bind_addr, proxy).await;
        if let Some(exit) = lifecycle.finish(LifecycleEvent::Exit).await {
            info!(%exit, "child process stopped");
        }
        outcome
    }

    async fn serve(
        &self,
        lifecycle: &Lifecycle,
        bind_addr: SocketAddr,
        proxy: ReverseProxy,
    ) -> anyhow::Result<()> {
        let health = &self.config.health;
        let health_url = self.config.gateway.health_url();

        info!(url = %health_url, "waiting for MCP server to start");
        tokio::select! {
            result = wait_for_server(&health_url, health.timeout, health.interval) => {
                result?;
            }
            _ = lifecycle.stopped() => {
                info!("shutdown requested before the MCP server came online");
                return Ok(());
            }
        }
        info!("MCP server is online");

        let server = ProxyServer::bind(bind_addr, proxy).await?;
        server.serve(lifecycle.subscribe()).await?;
        Ok(())
    }
}
