//! The path-parameter payload handed to the orchestrator with each request.
//!
//! A payload is an awaitable, possibly absent, ordered mapping of names to a
//! string or a sequence of strings. Hosts that learn their parameters
//! asynchronously hand over a future; the orchestrator and every extractor
//! await the same shared result.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;

/// A single payload value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A single string.
    One(String),
    /// A sequence of strings, e.g. catch-all path segments.
    Many(Vec<String>),
}

impl ParamValue {
    /// Flatten the value into a route string, joining sequences with `/`.
    #[must_use]
    pub fn join(&self) -> String {
        match self {
            Self::One(value) => value.clone(),
            Self::Many(values) => values.join("/"),
        }
    }
}

/// Resolved payload entries in declaration order.
pub type PayloadParams = Arc<Vec<(String, ParamValue)>>;

/// An awaitable path-parameter payload.
///
/// Cloning shares the underlying future.
#[derive(Clone, Default)]
pub struct RoutePayload {
    inner: Option<Shared<BoxFuture<'static, PayloadParams>>>,
}

impl std::fmt::Debug for RoutePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutePayload")
            .field("present", &self.inner.is_some())
            .finish()
    }
}

impl RoutePayload {
    /// A payload that was never provided.
    #[must_use]
    pub fn absent() -> Self {
        Self::default()
    }

    /// A payload whose entries are already known.
    #[must_use]
    pub fn ready(entries: Vec<(String, ParamValue)>) -> Self {
        let entries = Arc::new(entries);
        Self::from_future(async move { entries })
    }

    /// A payload produced by `future`.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = PayloadParams> + Send + 'static,
    {
        Self {
            inner: Some(future.boxed().shared()),
        }
    }

    /// Build the payload for a request path below the mount point.
    ///
    /// The segments are stored under the name `path`. An empty path yields
    /// an empty sequence.
    ///
    /// ```
    /// # tokio_test::block_on(async {
    /// use routestack_http::RoutePayload;
    ///
    /// let payload = RoutePayload::from_path("/users/42/");
    /// assert_eq!(payload.route().await, "users/42");
    /// # });
    /// ```
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        Self::ready(vec![("path".to_owned(), ParamValue::Many(segments))])
    }

    /// Whether a payload was provided at all.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.inner.is_some()
    }

    /// Await the entries. `None` when the payload is absent.
    pub async fn resolve(&self) -> Option<PayloadParams> {
        match &self.inner {
            Some(shared) => Some(shared.clone().await),
            None => None,
        }
    }

    /// Await the payload and flatten its first value into a route string.
    ///
    /// Absent or empty payloads yield an empty route.
    pub async fn route(&self) -> String {
        self.resolve()
            .await
            .and_then(|entries| entries.first().map(|(_, value)| value.join()))
            .unwrap_or_default()
    }

    /// Await the payload as a JSON object.
    pub async fn to_json(&self) -> serde_json::Value {
        let Some(entries) = self.resolve().await else {
            return serde_json::Value::Null;
        };
        serde_json::Value::Object(
            entries
                .iter()
                .map(|(name, value)| {
                    let value = match value {
                        ParamValue::One(v) => serde_json::Value::String(v.clone()),
                        ParamValue::Many(vs) => vs.iter().cloned().collect(),
                    };
                    (name.clone(), value)
                })
                .collect(),
        )
    }
}
