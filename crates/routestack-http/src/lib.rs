//! Metadata-driven request dispatch for RouteStack.
//!
//! This crate holds the dispatch engine and its hyper host:
//!
//! - **Registry**: controller descriptors with prefixes, route tables,
//!   captured handlers, parameter bindings and response metadata
//! - **Matcher**: `/`-segmented patterns with `:name` captures
//! - **Extractors**: concurrent, positional argument resolution
//! - **Response assembly**: method defaults, metadata overrides, cookies
//! - **Orchestrator**: the per-request phase sequence in [`Application`]
//! - **Service**: hyper `Service` implementation mounting the orchestrator

pub mod body;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod payload;
pub mod registry;
pub mod response;
pub mod service;

pub use body::ResponseBody;
pub use context::{ExecutionContext, RawRequest, RouteView};
pub use dispatch::{
    Application, ApplicationOptions, DispatchTarget, MethodHandler, MethodHandlers, PrefixSource,
    SUPPORTED_METHODS,
};
pub use error::{DispatchError, DispatchErrorCode};
pub use extract::{Args, Argument, Extractor, ParamBinding, extractor, extractors, resolve_arguments};
pub use matcher::{PathParams, join_path, match_route};
pub use payload::{ParamValue, RoutePayload};
pub use registry::{ControllerDescriptor, ControllerRegistry, HandlerFn, RouteEntry};
pub use response::{HeaderSource, ResponseMeta, ResponseShell};
pub use service::{RouteStackHttpConfig, RouteStackHttpService};
