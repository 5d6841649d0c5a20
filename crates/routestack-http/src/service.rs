//! RouteStack HTTP service implementing the hyper `Service` trait.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use tracing::{info, warn};

use crate::body::ResponseBody;
use crate::dispatch::{Application, MethodHandlers};
use crate::error::{DispatchError, DispatchErrorCode};
use crate::payload::RoutePayload;
use crate::response::{error_to_response, json_response};

/// Path of the built-in health endpoint.
pub const HEALTH_PATH: &str = "/_routestack/health";

/// Configuration for the RouteStack HTTP service.
#[derive(Debug, Clone)]
pub struct RouteStackHttpConfig {
    /// Path under which the dispatch engine is mounted.
    pub mount: String,
}

impl Default for RouteStackHttpConfig {
    fn default() -> Self {
        Self {
            mount: "/api".to_owned(),
        }
    }
}

/// Hyper `Service` implementation for RouteStack.
///
/// Buffers each request, builds its path-parameter payload from the URI
/// below the mount point and hands it to the [`Application`] entry point of
/// the request's method.
#[derive(Debug, Clone)]
pub struct RouteStackHttpService {
    handlers: Arc<MethodHandlers>,
    config: Arc<RouteStackHttpConfig>,
}

impl RouteStackHttpService {
    /// Create a new `RouteStackHttpService`.
    #[must_use]
    pub fn new(app: &Arc<Application>, config: RouteStackHttpConfig) -> Self {
        Self {
            handlers: Arc::new(app.handlers()),
            config: Arc::new(config),
        }
    }

    /// Dispatch an already buffered request.
    ///
    /// This is the whole pipeline minus body collection, usable without a
    /// live connection.
    pub async fn handle(
        &self,
        request: http::Request<Bytes>,
        request_id: &str,
    ) -> http::Response<ResponseBody> {
        let method = request.method().clone();
        let path = request.uri().path().to_owned();

        let response = process_request(request, &self.handlers, &self.config, request_id).await;
        info!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            request_id,
            "request served"
        );
        add_common_headers(response, request_id)
    }
}

impl hyper::service::Service<http::Request<Incoming>> for RouteStackHttpService {
    type Response = http::Response<ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let service = self.clone();
        let request_id = uuid::Uuid::new_v4().to_string();

        Box::pin(async move {
            let (parts, incoming) = req.into_parts();
            let body = match collect_body(incoming).await {
                Ok(body) => body,
                Err(err) => {
                    warn!(error = %err, request_id = %request_id, "failed to read request body");
                    let response = error_to_response(&err, &request_id);
                    return Ok(add_common_headers(response, &request_id));
                }
            };
            let request = http::Request::from_parts(parts, body);
            Ok(service.handle(request, &request_id).await)
        })
    }
}

/// Process a single buffered request through the full pipeline.
async fn process_request(
    request: http::Request<Bytes>,
    handlers: &MethodHandlers,
    config: &RouteStackHttpConfig,
    request_id: &str,
) -> http::Response<ResponseBody> {
    // 1. Health check.
    if request.method() == http::Method::GET && request.uri().path() == HEALTH_PATH {
        return health_response();
    }

    // 2. Strip the mount point.
    let Some(route) = strip_mount(request.uri().path(), &config.mount) else {
        let err = DispatchError::with_message(
            DispatchErrorCode::NoRoute,
            format!("{} is outside {}", request.uri().path(), config.mount),
        );
        return error_to_response(&err, request_id);
    };
    let payload = RoutePayload::from_path(route);

    // 3. Select the entry point for the method.
    let Some(handler) = handlers.for_method(request.method()) else {
        let err = DispatchError::method_not_allowed(request.method());
        let mut response = error_to_response(&err, request_id);
        response.headers_mut().insert(
            http::header::ALLOW,
            http::HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS, HEAD"),
        );
        return response;
    };

    // 4. Dispatch.
    match handler.call(request, payload).await {
        Ok(response) => response,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, request_id, "dispatch failed");
            error_to_response(&err, request_id)
        }
    }
}

/// The part of `path` below `mount`, or `None` when `path` is not under it.
fn strip_mount<'a>(path: &'a str, mount: &str) -> Option<&'a str> {
    let mount = mount.trim_end_matches('/');
    if mount.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(mount)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

fn health_response() -> http::Response<ResponseBody> {
    let json = serde_json::to_vec(&serde_json::json!({
        "status": "running",
        "service": "routestack",
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .expect("JSON serialization of health status cannot fail");
    json_response(http::StatusCode::OK, json)
}

/// Collect the incoming body into a single `Bytes` buffer.
async fn collect_body(incoming: Incoming) -> Result<Bytes, DispatchError> {
    incoming
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .map_err(|e| DispatchError::internal(format!("Failed to read request body: {e}")).with_source(e))
}

/// Add common response headers to every RouteStack response.
fn add_common_headers(
    mut response: http::Response<ResponseBody>,
    request_id: &str,
) -> http::Response<ResponseBody> {
    let headers = response.headers_mut();

    if let Ok(hv) = http::HeaderValue::from_str(request_id) {
        headers.entry("x-request-id").or_insert(hv);
    }

    headers.insert("server", http::HeaderValue::from_static("RouteStack"));

    response
}
