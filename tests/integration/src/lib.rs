//! Integration tests for the RouteStack server.
//!
//! Every test starts an in-process server on an ephemeral loopback port and
//! talks to it over real HTTP with `reqwest`, so no external server is needed.
//!
//! Run them with:
//! ```text
//! cargo test -p routestack-integration
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Once};

use anyhow::{Context, Result};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use routestack_core::{Configuration, Cookie};
use routestack_http::{
    Application, ApplicationOptions, Args, ControllerRegistry, DispatchError, HeaderSource,
    ResponseMeta, RouteStackHttpConfig, RouteStackHttpService, extractors,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::debug;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A server running inside the test's runtime. Stops when dropped.
#[derive(Debug)]
pub struct TestServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Absolute URL of `path` on this server.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Serve `app` on an ephemeral loopback port.
pub async fn spawn_server(app: &Arc<Application>, config: RouteStackHttpConfig) -> Result<TestServer> {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind test listener")?;
    let addr = listener.local_addr()?;
    let service = RouteStackHttpService::new(app, config);

    let task = tokio::spawn(async move {
        let http = HttpConnBuilder::new(TokioExecutor::new());
        loop {
            let Ok((stream, peer_addr)) = listener.accept().await else {
                continue;
            };
            let conn = http
                .serve_connection(TokioIo::new(stream), service.clone())
                .into_owned();
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    debug!(peer_addr = %peer_addr, error = %e, "test connection closed");
                }
            });
        }
    });

    Ok(TestServer { addr, task })
}

/// Serve the catalog fixture mounted at `/api`.
pub async fn catalog_server(options: ApplicationOptions) -> Result<TestServer> {
    let app = Arc::new(Application::new(Arc::new(catalog_registry()), options));
    spawn_server(&app, RouteStackHttpConfig::default()).await
}

/// Options with a fixed configuration instead of the process environment.
#[must_use]
pub fn fixture_options() -> ApplicationOptions {
    ApplicationOptions::new().base_config(Configuration::from_pairs([
        ("FEATURE_FLAG", "true"),
        ("PAGE_SIZE", "25"),
        ("REGION", "eu-west-1"),
    ]))
}

/// HTTP client for the tests.
#[must_use]
pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

/// Every `set-cookie` header of `headers`.
#[must_use]
pub fn set_cookies(headers: &reqwest::header::HeaderMap) -> Vec<String> {
    headers
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_owned))
        .collect()
}

/// Controller used by every integration test.
#[derive(Debug, Default)]
pub struct CatalogController;

/// Registry holding [`CatalogController`] under the `catalog` prefix.
#[must_use]
pub fn catalog_registry() -> ControllerRegistry {
    let mut registry = ControllerRegistry::new();
    register_catalog(&mut registry);
    registry
}

/// Register [`CatalogController`] into `registry`.
pub fn register_catalog(registry: &mut ControllerRegistry) {
    let mut static_headers = HeaderMap::new();
    static_headers.insert("x-catalog", HeaderValue::from_static("1"));

    registry
        .register::<CatalogController>()
        .set_prefix("catalog")
        .route(Method::GET, "/items", "list", |_: Arc<CatalogController>, args: Args| async move {
            Ok::<_, DispatchError>(json!({ "query": args.value(0), "pageSize": args.value(1) }))
        })
        .bind_param("list", 0, extractors::query(), Value::Null)
        .bind_param("list", 1, extractors::config(), "PAGE_SIZE")
        .route(Method::GET, "/items/:id", "get", |_: Arc<CatalogController>, args: Args| async move {
            let id: String = args.json(0)?;
            Ok::<_, DispatchError>(json!({ "id": id }))
        })
        .bind_param("get", 0, extractors::param(), "id")
        .route(
            Method::GET,
            "/items/:id/tags/:tag",
            "tag",
            |_: Arc<CatalogController>, args: Args| async move {
                Ok::<_, DispatchError>(args.value(0).cloned().unwrap_or(Value::Null))
            },
        )
        .bind_param("tag", 0, extractors::params(), Value::Null)
        .route(Method::POST, "/items", "create", |_: Arc<CatalogController>, args: Args| async move {
            Ok::<_, DispatchError>(json!({ "created": args.value(0) }))
        })
        .bind_param("create", 0, extractors::body(), Value::Null)
        .route(Method::PATCH, "/items/:id", "patch", |_: Arc<CatalogController>, args: Args| async move {
            let id: String = args.json(0)?;
            Ok::<_, DispatchError>(json!({ "patched": id }))
        })
        .bind_param("patch", 0, extractors::param(), "id")
        .merge_response_meta(
            "patch",
            ResponseMeta::new()
                .status(StatusCode::ACCEPTED)
                .status_text("Queued")
                .headers(HeaderSource::Static(static_headers))
                .cookies(vec![Cookie::new("flavor", "plain").with_path("/")]),
        )
        .route(Method::DELETE, "/items/:id", "delete", |_: Arc<CatalogController>, _: Args| async move {
            Err::<Value, _>(DispatchError::handler("items are immutable"))
        })
        .route(Method::GET, "/session", "session", |_: Arc<CatalogController>, args: Args| async move {
            if let Some(shell) = args.response(1) {
                shell.set_header(
                    http::HeaderName::from_static("x-session"),
                    HeaderValue::from_static("issued"),
                );
                shell.set_cookie(Cookie::new("sid", "s-1").with_path("/").http_only());
            }
            Ok::<_, DispatchError>(json!({ "cookies": args.value(0) }))
        })
        .bind_param("session", 0, extractors::cookies(), Value::Null)
        .bind_param("session", 1, extractors::response(), Value::Null)
        .route(Method::GET, "/flags", "flags", |_: Arc<CatalogController>, args: Args| async move {
            Ok::<_, DispatchError>(json!({
                "featureFlag": args.value(0),
                "region": args.value(1),
                "missing": args.value(2),
            }))
        })
        .bind_param("flags", 0, extractors::config(), "FEATURE_FLAG")
        .bind_param("flags", 1, extractors::config(), "REGION")
        .bind_param("flags", 2, extractors::config(), "NOT_SET");
}

mod test_config;
mod test_dispatch;
mod test_error;
mod test_response;
