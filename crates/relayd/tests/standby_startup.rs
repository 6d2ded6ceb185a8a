//! Full startup and shutdown of the relay against a loopback backend.
//!
//! The gateway child is a small shell script that ignores its arguments,
//! idles, and records when it receives SIGINT. The backend is served by
//! the test itself on the port the gateway would have used.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};

use relay_core::{PlatformEnv, RelayConfig};
use relayd::{App, Lifecycle, LifecycleEvent};

fn standby() -> PlatformEnv {
    PlatformEnv {
        meta_origin: Some("STANDBY".to_string()),
        standby_port: 0,
    }
}

async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Write a gateway stand-in that touches `marker` on SIGINT.
fn gateway_script(dir: &Path, marker: &Path) -> PathBuf {
    let path = dir.join("fake-gateway.sh");
    let script = format!(
        "#!/bin/sh\ntrap 'echo interrupted > \"{}\"; exit 0' INT\nwhile :; do sleep 0.05; done\n",
        marker.display()
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

async fn backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let svc = service_fn(|req: Request<Incoming>| async move {
                    let body = match req.uri().path() {
                        "/health" => "healthy",
                        _ => "hello from backend",
                    };
                    Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(body))))
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), svc)
                    .await;
            });
        }
    });
    addr
}

fn config(program: &Path, gateway_port: u16, proxy_port: u16) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.gateway.program = program.display().to_string();
    config.gateway.port = gateway_port;
    config.health.timeout = Duration::from_secs(5);
    config.health.interval = Duration::from_millis(50);
    config.proxy.bind_address = "127.0.0.1".to_string();
    config.proxy.port = Some(proxy_port);
    config
}

async fn get(addr: SocketAddr, path: &str, probe: bool) -> (StatusCode, String) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let mut req = Request::builder().uri(path).header("host", addr.to_string());
    if probe {
        req = req.header("x-apify-container-server-readiness-probe", "1");
    }
    let resp = sender
        .send_request(req.body(Full::new(Bytes::new())).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn wait_until_listening(addr: SocketAddr) {
    for _ in 0..100 {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("proxy never started listening on {addr}");
}

#[tokio::test]
async fn proxies_after_backend_is_healthy_and_stops_child_on_interrupt() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("interrupted");
    let script = gateway_script(dir.path(), &marker);

    let backend = backend().await;
    let proxy_port = free_port().await;
    let proxy_addr: SocketAddr = ([127, 0, 0, 1], proxy_port).into();

    let lifecycle = Lifecycle::new();
    let trigger = lifecycle.trigger();
    let run = tokio::spawn(App::new(config(&script, backend.port(), proxy_port), standby()).run(lifecycle));

    wait_until_listening(proxy_addr).await;

    let (status, body) = get(proxy_addr, "/hello", false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "hello from backend");

    let (status, body) = get(proxy_addr, "/hello", true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    trigger.fire(LifecycleEvent::Interrupt);
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("relay should stop after interrupt")
        .unwrap()
        .unwrap();

    assert!(marker.exists(), "gateway did not receive SIGINT");
    assert!(TcpStream::connect(proxy_addr).await.is_err());
}

#[tokio::test]
async fn health_timeout_aborts_startup_and_stops_child() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("interrupted");
    let script = gateway_script(dir.path(), &marker);

    let dead_port = free_port().await;
    let proxy_port = free_port().await;
    let mut config = config(&script, dead_port, proxy_port);
    config.health.timeout = Duration::from_millis(200);

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        App::new(config, standby()).run(Lifecycle::new()),
    )
    .await
    .expect("startup should give up after the health timeout")
    .unwrap_err();

    assert!(err.to_string().contains("not online after 200ms"), "{err}");
    assert!(marker.exists(), "gateway did not receive SIGINT");
    assert!(TcpStream::connect(("127.0.0.1", proxy_port)).await.is_err());
}

#[tokio::test]
async fn interrupt_during_startup_stops_child() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("interrupted");
    let script = gateway_script(dir.path(), &marker);

    let dead_port = free_port().await;
    let proxy_port = free_port().await;
    let mut config = config(&script, dead_port, proxy_port);
    config.health.timeout = Duration::from_secs(30);

    let lifecycle = Lifecycle::new();
    let trigger = lifecycle.trigger();
    let run = tokio::spawn(App::new(config, standby()).run(lifecycle));

    tokio::time::sleep(Duration::from_millis(150)).await;
    trigger.fire(LifecycleEvent::Aborting);

    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("relay should stop during startup")
        .unwrap()
        .unwrap();
    assert!(marker.exists(), "gateway did not receive SIGINT");
}
