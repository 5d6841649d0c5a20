//! Core building blocks shared by the RouteStack crates.
//!
//! This crate holds everything the dispatch engine consumes but does not own:
//!
//! - **Server settings** ([`ServerConfig`]): listen address, log level, mount point.
//! - **Configuration provider** ([`Configuration`]): the key/value snapshot that
//!   extractors and prefix functions read, with primitive coercion.
//! - **Query decoding** ([`parse_query`]): turns a query string into nested JSON.
//! - **Cookies** ([`CookieJar`], [`Cookie`]): request cookie parsing and
//!   `Set-Cookie` serialization.

mod coerce;
mod config;
mod configuration;
mod cookie;
mod error;
mod query;

pub use coerce::{coerce_primitive, coerce_query_value};
pub use config::ServerConfig;
pub use configuration::{ConfigInitializer, Configuration, initializer};
pub use cookie::{Cookie, CookieJar, SameSite};
pub use error::{CoreError, CoreResult};
pub use query::parse_query;
