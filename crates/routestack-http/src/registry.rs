//! Controller metadata registry.
//!
//! A controller is any `Default + Send + Sync` type. Registering it yields a
//! [`ControllerDescriptor`] that collects its prefix, route table, handler
//! functions, parameter bindings and response metadata. The registry is
//! populated during startup, then frozen behind an `Arc` and read without
//! locks.
//!
//! ```
//! use std::sync::Arc;
//!
//! use routestack_http::{Args, ControllerRegistry, DispatchError, extractors};
//!
//! #[derive(Default)]
//! struct Greeter;
//!
//! let mut registry = ControllerRegistry::new();
//! registry
//!     .register::<Greeter>()
//!     .set_prefix("greet")
//!     .route(http::Method::GET, "/:name", "hello", |_: Arc<Greeter>, args: Args| async move {
//!         let name: String = args.json(0)?;
//!         Ok::<_, DispatchError>(format!("hello {name}"))
//!     })
//!     .bind_param("hello", 0, extractors::param(), "name");
//!
//! assert_eq!(registry.len(), 1);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::error::DispatchError;
use crate::extract::{Args, Extractor, ParamBinding};
use crate::response::ResponseMeta;

/// A type-erased controller singleton.
pub type ControllerInstance = Arc<dyn Any + Send + Sync>;

/// A captured handler: `(controller, args) -> JSON result`.
pub type HandlerFn = Arc<
    dyn Fn(ControllerInstance, Args) -> BoxFuture<'static, Result<Value, DispatchError>>
        + Send
        + Sync,
>;

/// One entry of a controller's route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// HTTP method.
    pub method: http::Method,
    /// Path pattern relative to the controller prefix.
    pub pattern: String,
    /// Name of the handler serving the route.
    pub handler: String,
}

/// Everything known about one registered controller.
pub struct ControllerDescriptor {
    type_id: TypeId,
    name: &'static str,
    prefix: Option<String>,
    routes: Vec<RouteEntry>,
    handlers: HashMap<String, HandlerFn>,
    params: HashMap<String, Vec<ParamBinding>>,
    response_meta: HashMap<String, ResponseMeta>,
    instance: OnceLock<ControllerInstance>,
    factory: fn() -> ControllerInstance,
}

impl std::fmt::Debug for ControllerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut handlers: Vec<_> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("ControllerDescriptor")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("routes", &self.routes)
            .field("handlers", &handlers)
            .field("params", &self.params)
            .field("response_meta", &self.response_meta)
            .field("instantiated", &self.instance.get().is_some())
            .finish_non_exhaustive()
    }
}

fn construct<C: Default + Send + Sync + 'static>() -> ControllerInstance {
    Arc::new(C::default())
}

impl ControllerDescriptor {
    fn new<C: Default + Send + Sync + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            name: std::any::type_name::<C>(),
            prefix: None,
            routes: Vec::new(),
            handlers: HashMap::new(),
            params: HashMap::new(),
            response_meta: HashMap::new(),
            instance: OnceLock::new(),
            factory: construct::<C>,
        }
    }

    /// Set the controller prefix.
    pub fn set_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Append a route to the table. Earlier routes win on overlap.
    pub fn add_route(
        &mut self,
        method: http::Method,
        pattern: impl Into<String>,
        handler: impl Into<String>,
    ) -> &mut Self {
        self.routes.push(RouteEntry {
            method,
            pattern: pattern.into(),
            handler: handler.into(),
        });
        self
    }

    /// Capture the function serving `name`.
    ///
    /// The function receives the controller singleton and the resolved
    /// arguments. Its result is serialized to JSON.
    pub fn handler<C, F, Fut, T>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        C: Send + Sync + 'static,
        F: Fn(Arc<C>, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, DispatchError>> + Send + 'static,
        T: Serialize,
    {
        let controller = self.name;
        let f = Arc::new(f);
        let handler: HandlerFn = Arc::new(move |instance, args| {
            let f = Arc::clone(&f);
            Box::pin(async move {
                let this = instance.downcast::<C>().map_err(|_| {
                    DispatchError::internal(format!(
                        "handler registered on `{controller}` expects a different controller type"
                    ))
                })?;
                let output = f(this, args).await?;
                serde_json::to_value(output).map_err(|e| {
                    DispatchError::internal(format!("failed to serialize handler result: {e}"))
                        .with_source(e)
                })
            })
        });
        self.handlers.insert(name.into(), handler);
        self
    }

    /// Add a route and capture its handler in one call.
    pub fn route<C, F, Fut, T>(
        &mut self,
        method: http::Method,
        pattern: impl Into<String>,
        name: impl Into<String>,
        f: F,
    ) -> &mut Self
    where
        C: Send + Sync + 'static,
        F: Fn(Arc<C>, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, DispatchError>> + Send + 'static,
        T: Serialize,
    {
        let name = name.into();
        self.add_route(method, pattern, name.clone());
        self.handler(name, f)
    }

    /// Bind `extractor` to position `index` of handler `name`.
    ///
    /// A binding already registered at the same position is replaced.
    pub fn bind_param(
        &mut self,
        name: impl Into<String>,
        index: usize,
        extractor: Extractor,
        options: impl Into<Value>,
    ) -> &mut Self {
        let binding = ParamBinding {
            index,
            extractor,
            options: options.into(),
        };
        let bindings = self.params.entry(name.into()).or_default();
        match bindings.iter_mut().find(|b| b.index == index) {
            Some(existing) => *existing = binding,
            None => bindings.push(binding),
        }
        self
    }

    /// Shallow-merge response metadata into what handler `name` already has.
    pub fn merge_response_meta(&mut self, name: impl Into<String>, partial: ResponseMeta) -> &mut Self {
        self.response_meta
            .entry(name.into())
            .or_default()
            .merge(partial);
        self
    }

    /// The singleton instance, constructed on first use.
    ///
    /// Concurrent first calls construct exactly once.
    pub fn get_instance(&self) -> ControllerInstance {
        Arc::clone(self.instance.get_or_init(self.factory))
    }

    /// Type token of the controller.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Type name of the controller.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Registered prefix, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Route table in registration order.
    #[must_use]
    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    /// Handler function registered under `name`.
    #[must_use]
    pub fn handler_fn(&self, name: &str) -> Option<&HandlerFn> {
        self.handlers.get(name)
    }

    /// Parameter bindings of handler `name`.
    #[must_use]
    pub fn params(&self, name: &str) -> &[ParamBinding] {
        self.params.get(name).map_or(&[], Vec::as_slice)
    }

    /// Response metadata of handler `name`.
    #[must_use]
    pub fn response_meta(&self, name: &str) -> Option<&ResponseMeta> {
        self.response_meta.get(name)
    }
}

/// Catalog of controller descriptors.
#[derive(Debug, Default)]
pub struct ControllerRegistry {
    descriptors: Vec<ControllerDescriptor>,
    index: HashMap<TypeId, usize>,
}

impl ControllerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The descriptor for `C`, created on first call.
    ///
    /// Repeated calls return the same descriptor.
    pub fn register<C: Default + Send + Sync + 'static>(&mut self) -> &mut ControllerDescriptor {
        let type_id = TypeId::of::<C>();
        let slot = match self.index.get(&type_id) {
            Some(&slot) => slot,
            None => {
                self.descriptors.push(ControllerDescriptor::new::<C>());
                let slot = self.descriptors.len() - 1;
                self.index.insert(type_id, slot);
                slot
            }
        };
        &mut self.descriptors[slot]
    }

    /// Descriptor for `C`, if registered.
    #[must_use]
    pub fn get<C: 'static>(&self) -> Option<&ControllerDescriptor> {
        self.get_by_id(TypeId::of::<C>())
    }

    /// Descriptor by type token, if registered.
    #[must_use]
    pub fn get_by_id(&self, type_id: TypeId) -> Option<&ControllerDescriptor> {
        self.index.get(&type_id).map(|&slot| &self.descriptors[slot])
    }

    /// The singleton of `C`, constructing it on first use.
    #[must_use]
    pub fn instance<C: Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.get::<C>()?.get_instance().downcast::<C>().ok()
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ControllerDescriptor> {
        self.descriptors.iter()
    }

    /// Number of registered controllers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
