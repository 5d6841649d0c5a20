//! Parameter resolution.
//!
//! Each handler owns a list of [`ParamBinding`]s: a positional index, an
//! extractor and the static options it was registered with. Before a handler
//! runs, every binding is resolved concurrently against the request's
//! [`ExecutionContext`] and the results are laid out by index into [`Args`].
//! Unbound positions hold [`Argument::Empty`].

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, try_join_all};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::{ExecutionContext, RawRequest};
use crate::error::DispatchError;
use crate::response::ResponseShell;

/// One resolved positional argument.
#[derive(Debug, Clone, Default)]
pub enum Argument {
    /// No binding targets this position.
    #[default]
    Empty,
    /// A JSON value.
    Value(Value),
    /// The raw request.
    Request(Arc<RawRequest>),
    /// The in-progress response.
    Response(ResponseShell),
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// An asynchronous extractor: `(options, context) -> argument`.
pub type Extractor =
    Arc<dyn Fn(Value, ExecutionContext) -> BoxFuture<'static, Result<Argument, DispatchError>> + Send + Sync>;

/// Wrap an async function into an [`Extractor`].
pub fn extractor<F, Fut>(f: F) -> Extractor
where
    F: Fn(Value, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Argument, DispatchError>> + Send + 'static,
{
    Arc::new(move |options, ctx| Box::pin(f(options, ctx)))
}

/// An extractor bound to a handler position.
#[derive(Clone)]
pub struct ParamBinding {
    /// Positional index in the handler's argument list.
    pub index: usize,
    /// The extractor producing the argument.
    pub extractor: Extractor,
    /// Static options passed to the extractor on every call.
    pub options: Value,
}

impl std::fmt::Debug for ParamBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamBinding")
            .field("index", &self.index)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Positional handler arguments.
#[derive(Debug, Clone, Default)]
pub struct Args(Vec<Argument>);

impl Args {
    /// Wrap an already laid out argument list.
    #[must_use]
    pub fn new(args: Vec<Argument>) -> Self {
        Self(args)
    }

    /// The argument at `index`; `None` past the end of the list.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Argument> {
        self.0.get(index)
    }

    /// The JSON value at `index`, if that slot holds one.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&Value> {
        match self.0.get(index) {
            Some(Argument::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Deserialize the value at `index` into `T`.
    ///
    /// Empty slots deserialize from `null`, so `Option<T>` reads them as `None`.
    pub fn json<T: DeserializeOwned>(&self, index: usize) -> Result<T, DispatchError> {
        let value = self.value(index).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| {
            DispatchError::extraction(format!("argument {index} has the wrong shape: {e}"))
                .with_source(e)
        })
    }

    /// The raw request at `index`, if that slot holds it.
    #[must_use]
    pub fn request(&self, index: usize) -> Option<Arc<RawRequest>> {
        match self.0.get(index) {
            Some(Argument::Request(req)) => Some(Arc::clone(req)),
            _ => None,
        }
    }

    /// The response handle at `index`, if that slot holds it.
    #[must_use]
    pub fn response(&self, index: usize) -> Option<ResponseShell> {
        match self.0.get(index) {
            Some(Argument::Response(shell)) => Some(shell.clone()),
            _ => None,
        }
    }

    /// Number of positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no positions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the positions in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Argument> {
        self.0.iter()
    }
}

/// Run every binding concurrently and lay the results out by index.
///
/// The list is `max(index) + 1` long; unbound positions are
/// [`Argument::Empty`]. The first extractor failure fails the whole call.
pub async fn resolve_arguments(
    bindings: &[ParamBinding],
    ctx: &ExecutionContext,
) -> Result<Args, DispatchError> {
    let Some(max_index) = bindings.iter().map(|b| b.index).max() else {
        return Ok(Args::default());
    };

    let resolved = try_join_all(bindings.iter().map(|binding| {
        let index = binding.index;
        let fut = (binding.extractor)(binding.options.clone(), ctx.clone());
        async move { fut.await.map(|arg| (index, arg)) }
    }))
    .await?;

    let mut args = vec![Argument::Empty; max_index + 1];
    for (index, arg) in resolved {
        args[index] = arg;
    }
    Ok(Args(args))
}

/// Built-in extractors.
pub mod extractors {
    use serde_json::Value;

    use super::{Argument, Extractor, extractor};
    use crate::error::DispatchError;

    /// The decoded request body.
    #[must_use]
    pub fn body() -> Extractor {
        extractor(|_, ctx| async move { ctx.router().body().map(Argument::Value) })
    }

    /// The decoded query string as an object.
    #[must_use]
    pub fn query() -> Extractor {
        extractor(|_, ctx| async move { Ok(Value::Object(ctx.router().query.clone()).into()) })
    }

    /// Every captured path parameter as an object.
    #[must_use]
    pub fn params() -> Extractor {
        extractor(|_, ctx| async move { Ok(ctx.router().params_json().into()) })
    }

    /// A single path parameter; the options carry its name.
    #[must_use]
    pub fn param() -> Extractor {
        extractor(|options, ctx| async move {
            let Value::String(name) = options else {
                return Err(DispatchError::extraction(
                    "param extractor expects the parameter name as options",
                ));
            };
            Ok(ctx
                .router()
                .params
                .get(&name)
                .map_or(Value::Null, |v| Value::String(v.clone()))
                .into())
        })
    }

    /// Request headers as an object.
    #[must_use]
    pub fn headers() -> Extractor {
        extractor(|_, ctx| async move { Ok(ctx.router().headers_json().into()) })
    }

    /// Request cookies as a name/value object.
    #[must_use]
    pub fn cookies() -> Extractor {
        extractor(|_, ctx| async move { Ok(ctx.router().cookies.to_json().into()) })
    }

    /// A configuration value; the options carry its key.
    #[must_use]
    pub fn config() -> Extractor {
        extractor(|options, ctx| async move {
            let Value::String(key) = options else {
                return Err(DispatchError::extraction(
                    "config extractor expects the configuration key as options",
                ));
            };
            Ok(ctx.config(&key).unwrap_or(Value::Null).into())
        })
    }

    /// The raw request.
    #[must_use]
    pub fn request() -> Extractor {
        extractor(|_, ctx| async move { Ok(Argument::Request(ctx.request())) })
    }

    /// The in-progress response.
    #[must_use]
    pub fn response() -> Extractor {
        extractor(|_, ctx| async move { Ok(Argument::Response(ctx.response().clone())) })
    }
}
