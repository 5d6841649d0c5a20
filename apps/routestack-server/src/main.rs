//! RouteStack Server - metadata-driven request dispatch over HTTP.
//!
//! This binary registers the stock controllers, builds the dispatch
//! [`Application`] and serves it with hyper. Every request below the mount
//! point is routed to a controller handler by the registered metadata.
//!
//! # Usage
//!
//! ```text
//! GATEWAY_LISTEN=0.0.0.0:4566 routestack-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:4566` | Bind address |
//! | `ROUTESTACK_MOUNT` | `/api` | Path the dispatch engine is mounted under |
//! | `ROUTESTACK_PREFIX` | *(empty)* | Application prefix in front of every controller prefix |
//! | `APP_NAME` | `routestack` | Name reported by `GET /system/info` |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod controllers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use routestack_core::{ServerConfig, initializer};
use routestack_http::service::HEALTH_PATH;
use routestack_http::{
    Application, ApplicationOptions, ControllerRegistry, RouteStackHttpConfig,
    RouteStackHttpService,
};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Server version reported in logs.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Build the dispatch application from the server settings.
fn build_application(config: &ServerConfig) -> Arc<Application> {
    let mut registry = ControllerRegistry::new();
    controllers::register(&mut registry);

    let options = ApplicationOptions::new()
        .prefix(config.prefix.clone())
        .initializer(
            "STARTED_AT",
            initializer(|_| async { Ok(json!(Utc::now().to_rfc3339())) }),
        );

    Arc::new(Application::new(Arc::new(registry), options))
}

/// Build the [`RouteStackHttpConfig`] from the [`ServerConfig`].
fn build_http_config(config: &ServerConfig) -> RouteStackHttpConfig {
    RouteStackHttpConfig {
        mount: config.mount.clone(),
    }
}

/// Accept connections until ctrl-c, then drain in-flight requests.
async fn serve(listener: TcpListener, service: RouteStackHttpService) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Request the health endpoint and succeed on a running status.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET {HEALTH_PATH} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env();

    // Handle --health-check flag for Docker HEALTHCHECK.
    if std::env::args().any(|a| a == "--health-check") {
        let addr = config.gateway_listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&config.log_level)?;
    config.validate().context("invalid server configuration")?;

    let app = build_application(&config);
    let controllers: Vec<_> = app
        .registry()
        .descriptors()
        .map(|d| d.prefix().unwrap_or_default().to_owned())
        .collect();
    let service = RouteStackHttpService::new(&app, build_http_config(&config));

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        %addr,
        mount = %config.mount,
        prefix = %config.prefix,
        controllers = ?controllers,
        version = VERSION,
        "starting RouteStack Server",
    );

    serve(listener, service).await
}
