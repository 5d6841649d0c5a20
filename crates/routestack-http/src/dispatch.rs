//! The dispatch orchestrator.
//!
//! [`Application`] runs each request through a fixed sequence of phases:
//!
//! 1. initialize configuration (once per process)
//! 2. resolve the application prefix
//! 3. extract the route from the path-parameter payload
//! 4. select the controller whose base path prefixes the route
//! 5. select the handler whose full pattern matches the route
//! 6. resolve the handler's arguments
//! 7. prepare the response (status and metadata headers)
//! 8. invoke the handler
//! 9. assemble the final response
//!
//! An unmatched controller or handler yields an empty, bodyless response.

use std::any::TypeId;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::Method;
use routestack_core::{ConfigInitializer, Configuration};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::body::ResponseBody;
use crate::context::{ExecutionContext, RawRequest, RouteView};
use crate::error::DispatchError;
use crate::extract::resolve_arguments;
use crate::matcher::{PathParams, join_path, match_route};
use crate::payload::RoutePayload;
use crate::registry::{ControllerDescriptor, ControllerRegistry};
use crate::response::{PreparedResponse, ResponseShell, empty_response};

/// Methods served by the dispatch engine.
pub const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
    Method::HEAD,
];

/// Prefix computed from configuration.
pub type PrefixFn =
    Arc<dyn Fn(Configuration) -> BoxFuture<'static, Result<String, DispatchError>> + Send + Sync>;

/// Where the application prefix comes from.
#[derive(Clone)]
pub enum PrefixSource {
    /// A fixed prefix.
    Static(String),
    /// Computed from the configuration on every request.
    Computed(PrefixFn),
}

impl Default for PrefixSource {
    fn default() -> Self {
        Self::Static(String::new())
    }
}

impl std::fmt::Debug for PrefixSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(prefix) => f.debug_tuple("Static").field(prefix).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Application options.
#[derive(Default)]
pub struct ApplicationOptions {
    prefix: PrefixSource,
    controllers: Vec<TypeId>,
    initializers: Vec<(String, ConfigInitializer)>,
    base_config: Option<Configuration>,
}

impl std::fmt::Debug for ApplicationOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<_> = self.initializers.iter().map(|(k, _)| k).collect();
        f.debug_struct("ApplicationOptions")
            .field("prefix", &self.prefix)
            .field("controllers", &self.controllers.len())
            .field("initializers", &keys)
            .field("base_config", &self.base_config.as_ref().map(Configuration::len))
            .finish()
    }
}

impl ApplicationOptions {
    /// Default options: empty prefix, every registered controller, the
    /// process environment as configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed application prefix.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = PrefixSource::Static(prefix.into());
        self
    }

    /// Compute the application prefix from configuration.
    #[must_use]
    pub fn prefix_with<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Configuration) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, DispatchError>> + Send + 'static,
    {
        self.prefix = PrefixSource::Computed(Arc::new(move |config| Box::pin(f(config))));
        self
    }

    /// Add `C` to the controllers considered, in call order.
    ///
    /// When no controller is added, every registered controller is
    /// considered in registration order.
    #[must_use]
    pub fn controller<C: 'static>(mut self) -> Self {
        self.controllers.push(TypeId::of::<C>());
        self
    }

    /// Register an async configuration initializer stored under `key`.
    #[must_use]
    pub fn initializer(mut self, key: impl Into<String>, init: ConfigInitializer) -> Self {
        self.initializers.push((key.into(), init));
        self
    }

    /// Start from `config` instead of the process environment.
    #[must_use]
    pub fn base_config(mut self, config: Configuration) -> Self {
        self.base_config = Some(config);
        self
    }
}

/// The handler and captures selected for a route.
#[derive(Debug)]
pub struct DispatchTarget<'a> {
    /// Resolved application prefix.
    pub prefix: String,
    /// The route that was matched.
    pub route: String,
    /// The selected controller.
    pub descriptor: &'a ControllerDescriptor,
    /// Name of the selected handler.
    pub handler: String,
    /// Captured path parameters.
    pub params: PathParams,
}

/// The dispatch orchestrator.
pub struct Application {
    registry: Arc<ControllerRegistry>,
    options: ApplicationOptions,
    config: OnceCell<Configuration>,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("controllers", &self.registry.len())
            .field("options", &self.options)
            .field("configured", &self.config.initialized())
            .finish()
    }
}

impl Application {
    /// Create an application over a frozen registry.
    #[must_use]
    pub fn new(registry: Arc<ControllerRegistry>, options: ApplicationOptions) -> Self {
        Self {
            registry,
            options,
            config: OnceCell::new(),
        }
    }

    /// The controller registry.
    #[must_use]
    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    /// The configuration snapshot, built on first use.
    pub async fn configuration(&self) -> Result<&Configuration, DispatchError> {
        self.config
            .get_or_try_init(|| async {
                let base = self
                    .options
                    .base_config
                    .clone()
                    .unwrap_or_else(Configuration::from_env);
                let config = base.initialize(&self.options.initializers).await?;
                debug!(entries = config.len(), "configuration initialized");
                Ok::<_, DispatchError>(config)
            })
            .await
    }

    /// The application prefix.
    pub async fn prefix(&self) -> Result<String, DispatchError> {
        match &self.options.prefix {
            PrefixSource::Static(prefix) => Ok(prefix.clone()),
            PrefixSource::Computed(f) => {
                let config = self.configuration().await?;
                f(config.clone()).await
            }
        }
    }

    /// Select the controller and handler for `method` and `route`.
    ///
    /// Raises [`NoRoute`](crate::DispatchErrorCode::NoRoute) when nothing matches.
    pub async fn resolve(
        &self,
        method: &Method,
        route: &str,
    ) -> Result<DispatchTarget<'_>, DispatchError> {
        self.configuration().await?;
        let prefix = self.prefix().await?;
        self.locate(method, &prefix, route)?
            .ok_or_else(|| DispatchError::no_route(method, route))
    }

    /// Run one request through every phase.
    pub async fn dispatch(
        &self,
        request: http::Request<Bytes>,
        payload: RoutePayload,
    ) -> Result<http::Response<ResponseBody>, DispatchError> {
        let method = request.method().clone();

        let config = self.configuration().await?.clone();
        debug!(phase = 1, "configuration ready");

        let prefix = self.prefix().await?;
        debug!(phase = 2, prefix = %prefix, "prefix resolved");

        let route = payload.route().await;
        debug!(phase = 3, route = %route, "route extracted");

        let Some(target) = self.locate(&method, &prefix, &route)? else {
            return Ok(empty_response());
        };
        let descriptor = target.descriptor;
        let handler_name = target.handler.as_str();
        let Some(handler) = descriptor.handler_fn(handler_name) else {
            warn!(
                controller = descriptor.name(),
                handler = handler_name,
                "route points at a handler with no function"
            );
            return Ok(empty_response());
        };

        let raw = Arc::new(RawRequest::new(request));
        let view = RouteView::new(&raw, target.params.clone(), route.clone());
        let instance = descriptor.get_instance();
        let ctx = ExecutionContext::new(
            Arc::clone(&raw),
            view,
            payload,
            config,
            ResponseShell::new(),
            Arc::clone(&instance),
        );

        let args = resolve_arguments(descriptor.params(handler_name), &ctx).await?;
        debug!(phase = 6, handler = handler_name, args = args.len(), "arguments resolved");

        let prepared =
            PreparedResponse::prepare(&method, descriptor.response_meta(handler_name), &ctx).await?;
        debug!(phase = 7, status = %prepared.status, "response prepared");

        let value = handler(instance, args).await?;
        debug!(phase = 8, handler = handler_name, "handler returned");

        let response = prepared.finish(&ctx, &value)?;
        debug!(phase = 9, status = %response.status(), "response assembled");
        Ok(response)
    }

    /// One entry point per supported method.
    #[must_use]
    pub fn handlers(self: &Arc<Self>) -> MethodHandlers {
        MethodHandlers {
            handlers: SUPPORTED_METHODS
                .iter()
                .map(|method| MethodHandler {
                    method: method.clone(),
                    app: Arc::clone(self),
                })
                .collect(),
        }
    }

    /// Controllers considered for dispatch, in order.
    fn candidates(&self) -> Vec<&ControllerDescriptor> {
        if self.options.controllers.is_empty() {
            return self.registry.descriptors().collect();
        }
        self.options
            .controllers
            .iter()
            .filter_map(|id| {
                let found = self.registry.get_by_id(*id);
                if found.is_none() {
                    debug!(type_id = ?id, "skipping unregistered controller");
                }
                found
            })
            .collect()
    }

    /// Phases 4 and 5.
    fn locate(
        &self,
        method: &Method,
        prefix: &str,
        route: &str,
    ) -> Result<Option<DispatchTarget<'_>>, DispatchError> {
        let route_path = with_trailing_slash(join_path([route]));

        let mut selected = None;
        for descriptor in self.candidates() {
            let controller_prefix = descriptor
                .prefix()
                .ok_or_else(|| DispatchError::configuration_fault(descriptor.name()))?;
            let base = with_trailing_slash(join_path([prefix, controller_prefix]));
            if route_path.starts_with(&base) {
                selected = Some((descriptor, controller_prefix));
                break;
            }
        }
        let Some((descriptor, controller_prefix)) = selected else {
            debug!(phase = 4, route = %route, "no controller matches route");
            return Ok(None);
        };
        debug!(phase = 4, controller = descriptor.name(), "controller selected");

        for entry in descriptor.routes().iter().filter(|e| e.method == *method) {
            let pattern = join_path([prefix, controller_prefix, entry.pattern.as_str()]);
            if let Some(params) = match_route(&pattern, route) {
                debug!(phase = 5, handler = %entry.handler, pattern = %pattern, "handler selected");
                return Ok(Some(DispatchTarget {
                    prefix: prefix.to_owned(),
                    route: route.to_owned(),
                    descriptor,
                    handler: entry.handler.clone(),
                    params,
                }));
            }
        }
        debug!(phase = 5, controller = descriptor.name(), method = %method, "no handler matches route");
        Ok(None)
    }
}

fn with_trailing_slash(mut path: String) -> String {
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

/// Dispatch entry point bound to one HTTP method.
#[derive(Debug, Clone)]
pub struct MethodHandler {
    method: Method,
    app: Arc<Application>,
}

impl MethodHandler {
    /// The method this entry point serves.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Dispatch one request with a fresh context.
    pub async fn call(
        &self,
        request: http::Request<Bytes>,
        payload: RoutePayload,
    ) -> Result<http::Response<ResponseBody>, DispatchError> {
        self.app.dispatch(request, payload).await
    }
}

/// The per-method entry points of an [`Application`].
#[derive(Debug, Clone)]
pub struct MethodHandlers {
    handlers: Vec<MethodHandler>,
}

impl MethodHandlers {
    /// The entry point for `method`, if it is supported.
    #[must_use]
    pub fn for_method(&self, method: &Method) -> Option<&MethodHandler> {
        self.handlers.iter().find(|h| h.method == *method)
    }

    /// Every entry point.
    pub fn iter(&self) -> std::slice::Iter<'_, MethodHandler> {
        self.handlers.iter()
    }
}
