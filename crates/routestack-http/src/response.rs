//! Response metadata, the in-progress response, and response assembly.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use http::header::{CONTENT_TYPE, SET_COOKIE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use parking_lot::Mutex;
use routestack_core::{Cookie, CookieJar};
use serde_json::Value;

use crate::body::ResponseBody;
use crate::context::ExecutionContext;
use crate::error::DispatchError;

/// Content type of every dispatched response body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Header map computed from the execution context.
pub type HeaderFn =
    Arc<dyn Fn(ExecutionContext) -> BoxFuture<'static, Result<HeaderMap, DispatchError>> + Send + Sync>;

/// Where a handler's response headers come from.
#[derive(Clone)]
pub enum HeaderSource {
    /// A fixed header map.
    Static(HeaderMap),
    /// Computed per request.
    Computed(HeaderFn),
    /// Produced once by a future and reused for every request.
    Deferred(Shared<BoxFuture<'static, HeaderMap>>),
}

impl std::fmt::Debug for HeaderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(map) => f.debug_tuple("Static").field(map).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl HeaderSource {
    /// Headers computed by `f` for each request.
    pub fn computed<F, Fut>(f: F) -> Self
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HeaderMap, DispatchError>> + Send + 'static,
    {
        Self::Computed(Arc::new(move |ctx| Box::pin(f(ctx))))
    }

    /// Headers produced once by `future`.
    pub fn deferred<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = HeaderMap> + Send + 'static,
    {
        Self::Deferred(future.boxed().shared())
    }

    async fn resolve(&self, ctx: &ExecutionContext) -> Result<HeaderMap, DispatchError> {
        match self {
            Self::Static(map) => Ok(map.clone()),
            Self::Computed(f) => f(ctx.clone()).await,
            Self::Deferred(shared) => Ok(shared.clone().await),
        }
    }
}

/// Per-handler response metadata.
///
/// Fields left `None` are untouched by [`merge`](Self::merge).
#[derive(Debug, Clone, Default)]
pub struct ResponseMeta {
    /// Status code override.
    pub status: Option<StatusCode>,
    /// Status text override.
    pub status_text: Option<String>,
    /// Extra headers.
    pub headers: Option<HeaderSource>,
    /// Extra cookies.
    pub cookies: Option<Vec<Cookie>>,
}

impl ResponseMeta {
    /// Empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status code.
    #[must_use]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the status text.
    #[must_use]
    pub fn status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = Some(text.into());
        self
    }

    /// Set the header source.
    #[must_use]
    pub fn headers(mut self, headers: HeaderSource) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Set the cookies.
    #[must_use]
    pub fn cookies(mut self, cookies: Vec<Cookie>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    /// Shallow merge: every field present in `other` replaces ours.
    pub fn merge(&mut self, other: Self) {
        if other.status.is_some() {
            self.status = other.status;
        }
        if other.status_text.is_some() {
            self.status_text = other.status_text;
        }
        if other.headers.is_some() {
            self.headers = other.headers;
        }
        if other.cookies.is_some() {
            self.cookies = other.cookies;
        }
    }
}

#[derive(Debug, Default)]
struct ShellState {
    headers: HeaderMap,
    cookies: CookieJar,
}

/// The in-progress response of one request.
///
/// Extractors and handlers stage headers and cookies here; they are folded
/// into the final response after the handler returns.
#[derive(Debug, Clone, Default)]
pub struct ResponseShell {
    inner: Arc<Mutex<ShellState>>,
}

impl ResponseShell {
    /// Create an empty shell.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a header.
    pub fn set_header(&self, name: http::HeaderName, value: HeaderValue) {
        self.inner.lock().headers.insert(name, value);
    }

    /// Add a header value, keeping existing ones.
    pub fn append_header(&self, name: http::HeaderName, value: HeaderValue) {
        self.inner.lock().headers.append(name, value);
    }

    /// Stage a cookie, replacing any staged cookie with the same name.
    pub fn set_cookie(&self, cookie: Cookie) {
        self.inner.lock().cookies.set(cookie);
    }

    /// Snapshot of the staged headers.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        self.inner.lock().headers.clone()
    }

    /// Snapshot of the staged cookies.
    #[must_use]
    pub fn cookies(&self) -> CookieJar {
        self.inner.lock().cookies.clone()
    }
}

/// Status and text used when a handler has no metadata.
#[must_use]
pub fn default_status(method: &Method) -> (StatusCode, &'static str) {
    if *method == Method::POST {
        (StatusCode::CREATED, "Created")
    } else {
        (StatusCode::OK, "OK")
    }
}

/// Status, status text and metadata headers, fixed before the handler runs.
#[derive(Debug)]
pub struct PreparedResponse {
    /// Final status code.
    pub status: StatusCode,
    /// Final status text; empty means none.
    pub status_text: String,
    meta_headers: Option<HeaderMap>,
    meta_cookies: Vec<Cookie>,
}

impl PreparedResponse {
    /// Resolve status and metadata headers for a handler.
    ///
    /// Without metadata the method default applies. With metadata its status
    /// and text win; missing values fall back to `200` and no text.
    pub async fn prepare(
        method: &Method,
        meta: Option<&ResponseMeta>,
        ctx: &ExecutionContext,
    ) -> Result<Self, DispatchError> {
        let Some(meta) = meta else {
            let (status, text) = default_status(method);
            return Ok(Self {
                status,
                status_text: text.to_owned(),
                meta_headers: None,
                meta_cookies: Vec::new(),
            });
        };

        let meta_headers = match &meta.headers {
            Some(source) => Some(source.resolve(ctx).await?),
            None => None,
        };

        Ok(Self {
            status: meta.status.unwrap_or(StatusCode::OK),
            status_text: meta.status_text.clone().unwrap_or_default(),
            meta_headers,
            meta_cookies: meta.cookies.clone().unwrap_or_default(),
        })
    }

    /// Fold staged state into the final header map.
    ///
    /// Metadata headers override staged ones. Every active cookie (request,
    /// metadata, staged) gets its own `set-cookie` header.
    pub fn headers(&self, ctx: &ExecutionContext) -> Result<HeaderMap, DispatchError> {
        let mut headers = ctx.response().headers();
        if let Some(meta_headers) = &self.meta_headers {
            headers.extend(meta_headers.clone());
        }

        let mut jar = ctx.router().cookies.clone();
        jar.extend(self.meta_cookies.iter().cloned());
        jar.extend(ctx.response().cookies());
        for cookie in &jar {
            let value = HeaderValue::from_str(&cookie.serialize()).map_err(|e| {
                DispatchError::internal(format!("cookie `{}` is not a valid header", cookie.name))
                    .with_source(e)
            })?;
            headers.append(SET_COOKIE, value);
        }
        Ok(headers)
    }

    /// Build the final response with `value` serialized as the JSON body.
    pub fn finish(
        self,
        ctx: &ExecutionContext,
        value: &Value,
    ) -> Result<http::Response<ResponseBody>, DispatchError> {
        let headers = self.headers(ctx)?;
        let body = ResponseBody::from_json(value).map_err(|e| {
            DispatchError::internal(format!("failed to serialize handler result: {e}"))
                .with_source(e)
        })?;

        let mut response = http::Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = headers;
        response
            .headers_mut()
            .entry(CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(JSON_CONTENT_TYPE));
        if !self.status_text.is_empty() {
            if let Ok(reason) = hyper::ext::ReasonPhrase::try_from(self.status_text.into_bytes()) {
                response.extensions_mut().insert(reason);
            }
        }
        Ok(response)
    }
}

/// The bodyless response returned when no controller or handler matches.
#[must_use]
pub fn empty_response() -> http::Response<ResponseBody> {
    http::Response::new(ResponseBody::empty())
}

/// Serialize a dispatch error into a JSON body.
#[must_use]
pub fn error_to_json(error: &DispatchError) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "code": error.code.as_str(),
        "message": error.message,
    }))
    .expect("JSON serialization of error cannot fail")
}

/// Convert a `DispatchError` into a complete HTTP error response.
#[must_use]
pub fn error_to_response(error: &DispatchError, request_id: &str) -> http::Response<ResponseBody> {
    http::Response::builder()
        .status(error.status_code)
        .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
        .header("x-request-id", request_id)
        .body(ResponseBody::from_bytes(error_to_json(error)))
        .expect("valid error response")
}

/// Build a JSON response outside the dispatch pipeline.
#[must_use]
pub fn json_response(status: StatusCode, json: Vec<u8>) -> http::Response<ResponseBody> {
    http::Response::builder()
        .status(status)
        .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
        .body(ResponseBody::from_bytes(json))
        .expect("valid JSON response")
}
