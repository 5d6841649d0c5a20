//! Dispatch error types.
//!
//! Faults raised anywhere in the dispatch pipeline are reported as a single
//! [`DispatchError`]. The host renders them as JSON:
//!
//! ```json
//! { "code": "NoRoute", "message": "no handler for GET /missing" }
//! ```

use std::fmt;

use routestack_core::CoreError;

/// Well-known dispatch error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum DispatchErrorCode {
    /// The selected controller has no registered prefix.
    ConfigurationFault,
    /// No handler matches the route (only raised by explicit resolution).
    NoRoute,
    /// A parameter extractor failed.
    ExtractionFault,
    /// The handler failed.
    HandlerFault,
    /// The HTTP method is not served.
    MethodNotAllowed,
    /// Host-level failure.
    #[default]
    Internal,
}

impl DispatchErrorCode {
    /// Returns the short error code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationFault => "ConfigurationFault",
            Self::NoRoute => "NoRoute",
            Self::ExtractionFault => "ExtractionFault",
            Self::HandlerFault => "HandlerFault",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::Internal => "Internal",
        }
    }

    /// Returns the default HTTP status code for this error.
    #[must_use]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::NoRoute => http::StatusCode::NOT_FOUND,
            Self::ExtractionFault => http::StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::ConfigurationFault | Self::HandlerFault | Self::Internal => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for DispatchErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fault raised while dispatching a request.
#[derive(Debug)]
pub struct DispatchError {
    /// The error code.
    pub code: DispatchErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The HTTP status code.
    pub status_code: http::StatusCode,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DispatchError({}): {}", self.code, self.message)
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<CoreError> for DispatchError {
    fn from(err: CoreError) -> Self {
        Self::internal(err.to_string()).with_source(err)
    }
}

impl DispatchError {
    /// Create a new `DispatchError` from an error code.
    #[must_use]
    pub fn new(code: DispatchErrorCode) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: code.as_str().to_owned(),
            code,
            source: None,
        }
    }

    /// Create a new `DispatchError` with a custom message.
    #[must_use]
    pub fn with_message(code: DispatchErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Override the HTTP status code.
    #[must_use]
    pub fn with_status(mut self, status: http::StatusCode) -> Self {
        self.status_code = status;
        self
    }

    // -- Convenience constructors --

    /// The controller matched by the route has no prefix.
    #[must_use]
    pub fn configuration_fault(controller: &str) -> Self {
        Self::with_message(
            DispatchErrorCode::ConfigurationFault,
            format!("controller `{controller}` has no registered prefix"),
        )
    }

    /// No handler matches `method` and `route`.
    #[must_use]
    pub fn no_route(method: &http::Method, route: &str) -> Self {
        Self::with_message(
            DispatchErrorCode::NoRoute,
            format!("no handler for {method} /{route}"),
        )
    }

    /// An extractor could not produce its argument.
    #[must_use]
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::with_message(DispatchErrorCode::ExtractionFault, message)
    }

    /// A handler failed.
    #[must_use]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::with_message(DispatchErrorCode::HandlerFault, message)
    }

    /// The method is not served by the dispatch engine.
    #[must_use]
    pub fn method_not_allowed(method: &http::Method) -> Self {
        Self::with_message(
            DispatchErrorCode::MethodNotAllowed,
            format!("method {method} is not supported"),
        )
    }

    /// Host-level failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_message(DispatchErrorCode::Internal, message)
    }
}
