//! Per-request execution context.
//!
//! [`ExecutionContext`] is the facade extractors, header functions and
//! handlers see. It bundles the raw request, a derived [`RouteView`], the
//! path-parameter payload, the configuration snapshot, the in-progress
//! response and the controller singleton. It is created once per dispatched
//! request and never shared across requests.

use std::any::Any;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use routestack_core::{Configuration, CookieJar, parse_query};
use serde_json::{Map, Value};

use crate::error::DispatchError;
use crate::matcher::PathParams;
use crate::payload::RoutePayload;
use crate::response::ResponseShell;

/// An inbound request with its body fully buffered.
#[derive(Debug)]
pub struct RawRequest {
    parts: http::request::Parts,
    body: Bytes,
}

impl RawRequest {
    /// Take ownership of a buffered request.
    #[must_use]
    pub fn new(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self { parts, body }
    }

    /// Request method.
    #[must_use]
    pub fn method(&self) -> &http::Method {
        &self.parts.method
    }

    /// Request URI as received.
    #[must_use]
    pub fn uri(&self) -> &http::Uri {
        &self.parts.uri
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &http::HeaderMap {
        &self.parts.headers
    }

    /// Request extensions.
    #[must_use]
    pub fn extensions(&self) -> &http::Extensions {
        &self.parts.extensions
    }

    /// The buffered body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Derived, read-only view of a request.
#[derive(Debug, Clone)]
pub struct RouteView {
    /// Request method.
    pub method: http::Method,
    /// Request headers.
    pub headers: http::HeaderMap,
    /// Cookies sent with the request.
    pub cookies: CookieJar,
    /// Absolute URL (`scheme://host/path?query`).
    pub url: String,
    /// `host[:port]` as addressed by the client.
    pub host: String,
    /// Host without the port.
    pub hostname: String,
    /// Explicit port, if any.
    pub port: Option<u16>,
    /// `x-forwarded-proto`, else the URI scheme, else `http`.
    pub scheme: String,
    /// `user-agent` header.
    pub user_agent: Option<String>,
    /// URI path.
    pub pathname: String,
    /// Raw query string including the leading `?`, or empty.
    pub search: String,
    /// Decoded query string.
    pub query: Map<String, Value>,
    /// Path parameters captured by the selected route.
    pub params: PathParams,
    /// The route the handler was selected for.
    pub route: String,
    content_type: Option<String>,
    body: Bytes,
}

impl RouteView {
    /// Derive the view of `request` for the selected route.
    #[must_use]
    pub fn new(request: &RawRequest, params: PathParams, route: String) -> Self {
        let headers = request.headers().clone();
        let uri = request.uri();

        let scheme = header_str(&headers, "x-forwarded-proto")
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_owned())
            .or_else(|| uri.scheme_str().map(str::to_owned))
            .unwrap_or_else(|| "http".to_owned());
        let host = header_str(&headers, HOST.as_str())
            .map(str::to_owned)
            .or_else(|| uri.authority().map(|a| a.as_str().to_owned()))
            .unwrap_or_else(|| "localhost".to_owned());
        let (hostname, port) = split_host(&host);

        let pathname = uri.path().to_owned();
        let search = uri.query().map(|q| format!("?{q}")).unwrap_or_default();
        let url = format!("{scheme}://{host}{pathname}{search}");

        Self {
            method: request.method().clone(),
            cookies: CookieJar::from_headers(&headers),
            user_agent: header_str(&headers, USER_AGENT.as_str()).map(str::to_owned),
            content_type: header_str(&headers, CONTENT_TYPE.as_str()).map(str::to_ascii_lowercase),
            query: parse_query(&search),
            body: request.body().clone(),
            headers,
            url,
            host,
            hostname,
            port,
            scheme,
            pathname,
            search,
            params,
            route,
        }
    }

    /// Headers as a JSON object; repeated headers are joined with `", "`.
    #[must_use]
    pub fn headers_json(&self) -> Value {
        let mut out = Map::new();
        for name in self.headers.keys() {
            let joined = self
                .headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect::<Vec<_>>()
                .join(", ");
            out.insert(name.as_str().to_owned(), Value::String(joined));
        }
        Value::Object(out)
    }

    /// Path parameters as a JSON object.
    #[must_use]
    pub fn params_json(&self) -> Value {
        Value::Object(
            self.params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    /// Decode the body according to its content type.
    ///
    /// | Content type | Result |
    /// |--------------|--------|
    /// | `text/plain`, `application/x-www-form-urlencoded`, `multipart/form-data` | string |
    /// | `application/octet-stream` | array of bytes |
    /// | anything else | JSON (`null` for an empty body) |
    pub fn body(&self) -> Result<Value, DispatchError> {
        let essence = self
            .content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .unwrap_or_default();

        match essence {
            "text/plain" | "application/x-www-form-urlencoded" | "multipart/form-data" => Ok(
                Value::String(String::from_utf8_lossy(&self.body).into_owned()),
            ),
            "application/octet-stream" => Ok(self.body.iter().copied().collect()),
            _ if self.body.is_empty() => Ok(Value::Null),
            _ => serde_json::from_slice(&self.body).map_err(|e| {
                DispatchError::extraction(format!("invalid JSON body: {e}")).with_source(e)
            }),
        }
    }

    /// The raw body bytes.
    #[must_use]
    pub fn raw_body(&self) -> &Bytes {
        &self.body
    }
}

fn header_str<'a>(headers: &'a http::HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Split `host[:port]`, keeping bracketed IPv6 literals intact.
fn split_host(host: &str) -> (String, Option<u16>) {
    let port_start = if host.starts_with('[') {
        host.find("]:").map(|i| i + 1)
    } else {
        host.rfind(':')
    };
    match port_start {
        Some(i) => match host[i + 1..].parse() {
            Ok(port) => (host[..i].to_owned(), Some(port)),
            Err(_) => (host.to_owned(), None),
        },
        None => (host.to_owned(), None),
    }
}

struct ContextInner {
    request: Arc<RawRequest>,
    view: RouteView,
    payload: RoutePayload,
    config: Configuration,
    response: ResponseShell,
    controller: Arc<dyn Any + Send + Sync>,
}

/// Per-request facade handed to extractors and handlers.
///
/// Cloning is cheap and every clone observes the same request and response.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("method", &self.inner.view.method)
            .field("route", &self.inner.view.route)
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    /// Assemble the context for one dispatched request.
    #[must_use]
    pub fn new(
        request: Arc<RawRequest>,
        view: RouteView,
        payload: RoutePayload,
        config: Configuration,
        response: ResponseShell,
        controller: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                request,
                view,
                payload,
                config,
                response,
                controller,
            }),
        }
    }

    /// The raw request.
    #[must_use]
    pub fn request(&self) -> Arc<RawRequest> {
        Arc::clone(&self.inner.request)
    }

    /// The derived request view.
    #[must_use]
    pub fn router(&self) -> &RouteView {
        &self.inner.view
    }

    /// The path-parameter payload.
    #[must_use]
    pub fn payload(&self) -> &RoutePayload {
        &self.inner.payload
    }

    /// The whole configuration snapshot.
    #[must_use]
    pub fn configuration(&self) -> &Configuration {
        &self.inner.config
    }

    /// Read one configuration value.
    #[must_use]
    pub fn config(&self, key: &str) -> Option<Value> {
        self.inner.config.get(key)
    }

    /// The in-progress response.
    #[must_use]
    pub fn response(&self) -> &ResponseShell {
        &self.inner.response
    }

    /// The singleton of the selected controller, if it is a `C`.
    #[must_use]
    pub fn controller<C: Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        Arc::clone(&self.inner.controller).downcast::<C>().ok()
    }
}
