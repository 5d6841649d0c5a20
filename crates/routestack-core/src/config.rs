//! Server settings.
//!
//! [`ServerConfig`] carries the host-level settings of a RouteStack server.
//! Values are loaded from environment variables, the same way every other
//! setting in the workspace is.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{CoreError, CoreResult};

/// Host-level server configuration.
///
/// # Examples
///
/// ```
/// use routestack_core::ServerConfig;
///
/// let config = ServerConfig::default();
/// assert_eq!(config.gateway_listen, "0.0.0.0:4566");
/// assert_eq!(config.mount, "/api");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Bind address (e.g. `"0.0.0.0:4566"`).
    #[builder(default = String::from("0.0.0.0:4566"))]
    pub gateway_listen: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Path under which the dispatch engine is mounted. Everything below it
    /// becomes the route handed to the orchestrator.
    #[builder(default = String::from("/api"))]
    pub mount: String,

    /// Application-wide route prefix placed in front of every controller prefix.
    #[builder(default)]
    pub prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            gateway_listen: String::from("0.0.0.0:4566"),
            log_level: String::from("info"),
            mount: String::from("/api"),
            prefix: String::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:4566` |
    /// | `LOG_LEVEL` | `info` |
    /// | `ROUTESTACK_MOUNT` | `/api` |
    /// | `ROUTESTACK_PREFIX` | *(empty)* |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("ROUTESTACK_MOUNT") {
            config.mount = v;
        }
        if let Ok(v) = std::env::var("ROUTESTACK_PREFIX") {
            config.prefix = v;
        }

        config
    }

    /// Check the settings for values the server cannot start with.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] when the listen address is empty or the
    /// mount point is not absolute.
    pub fn validate(&self) -> CoreResult<()> {
        if self.gateway_listen.trim().is_empty() {
            return Err(CoreError::Config("GATEWAY_LISTEN must not be empty".into()));
        }
        if !self.mount.is_empty() && !self.mount.starts_with('/') {
            return Err(CoreError::Config(format!(
                "ROUTESTACK_MOUNT must start with '/', got {:?}",
                self.mount
            )));
        }
        Ok(())
    }
}
