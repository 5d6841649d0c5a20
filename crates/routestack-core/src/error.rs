//! Error types for the RouteStack core.

/// Core error type for RouteStack infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A configuration initializer failed while building the snapshot.
    #[error("configuration initializer `{key}` failed: {message}")]
    Initializer {
        /// Key the initializer was registered under.
        key: String,
        /// Failure description.
        message: String,
    },

    /// Invalid server setting.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    /// Build an initializer failure for `key`.
    #[must_use]
    pub fn initializer(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Initializer {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Convenience result type for RouteStack core operations.
pub type CoreResult<T> = Result<T, CoreError>;
