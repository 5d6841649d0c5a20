//! The configuration provider read by extractors and prefix functions.
//!
//! A [`Configuration`] is an immutable key/value snapshot. It starts from the
//! process environment and is then extended with the results of registered
//! asynchronous initializers. Reads coerce string values with
//! [`coerce_primitive`](crate::coerce_primitive); values produced by
//! initializers are returned as they are.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, try_join_all};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::coerce::coerce_primitive;
use crate::error::CoreResult;

/// An asynchronous configuration initializer.
///
/// It receives the environment-only snapshot and produces the value stored
/// under the key it was registered with.
pub type ConfigInitializer =
    Arc<dyn Fn(Configuration) -> BoxFuture<'static, CoreResult<Value>> + Send + Sync>;

/// Wrap an async function into a [`ConfigInitializer`].
///
/// ```
/// use routestack_core::{Configuration, initializer};
/// use serde_json::json;
///
/// let init = initializer(|config: Configuration| async move {
///     let port = config.get("PORT").unwrap_or(json!(8080));
///     Ok(json!({ "port": port }))
/// });
/// # let _ = init;
/// ```
pub fn initializer<F, Fut>(f: F) -> ConfigInitializer
where
    F: Fn(Configuration) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CoreResult<Value>> + Send + 'static,
{
    Arc::new(move |config| Box::pin(f(config)))
}

/// Immutable configuration snapshot.
///
/// Cloning is cheap: the values live behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    values: Arc<HashMap<String, Value>>,
}

impl Configuration {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_pairs(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// Build a configuration from raw string pairs.
    #[must_use]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), Value::String(v.into())))
            .collect();
        Self {
            values: Arc::new(values),
        }
    }

    /// Return a copy of this snapshot with `key` set to `value`.
    #[must_use]
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value.into());
        Self {
            values: Arc::new(values),
        }
    }

    /// Run every initializer concurrently against `self` and merge the results.
    ///
    /// # Errors
    ///
    /// Fails with the first initializer error; no partial snapshot is returned.
    pub async fn initialize(
        &self,
        initializers: &[(String, ConfigInitializer)],
    ) -> CoreResult<Self> {
        if initializers.is_empty() {
            return Ok(self.clone());
        }

        let results = try_join_all(initializers.iter().map(|(key, init)| {
            let base = self.clone();
            let key = key.clone();
            let fut = init(base);
            async move { fut.await.map(|value| (key, value)) }
        }))
        .await?;

        let mut values = (*self.values).clone();
        for (key, value) in results {
            debug!(key = %key, "merged configuration initializer result");
            values.insert(key, value);
        }

        Ok(Self {
            values: Arc::new(values),
        })
    }

    /// Read a value, coercing strings to booleans and numbers where they look like one.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).map(|value| match value {
            Value::String(s) => coerce_primitive(s),
            other => other.clone(),
        })
    }

    /// Read a value or fall back to `default`.
    #[must_use]
    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.get(key).unwrap_or_else(|| default.into())
    }

    /// Read a value and deserialize it into `T`.
    ///
    /// Returns `None` when the key is missing or the value does not fit `T`.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Every stored value, uncoerced.
    #[must_use]
    pub fn all(&self) -> &HashMap<String, Value> {
        &self.values
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
