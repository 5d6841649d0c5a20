//! Controllers served by the stock RouteStack server.
//!
//! `users` is a small in-memory CRUD resource. `system` exposes server
//! information and request introspection. Together they exercise every
//! built-in extractor, response metadata and the response shell.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use parking_lot::Mutex;
use routestack_core::{Cookie, SameSite};
use routestack_http::{
    Args, ControllerRegistry, DispatchError, ExecutionContext, HeaderSource, ResponseMeta,
    extractor, extractors,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Register every controller of the server.
pub fn register(registry: &mut ControllerRegistry) {
    register_users(registry);
    register_system(registry);
}

// ---------------------------------------------------------------------------
// users
// ---------------------------------------------------------------------------

/// A stored user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Server-assigned identifier.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Contact address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
struct UserInput {
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
    offset: Option<usize>,
    name: Option<Value>,
}

impl ListQuery {
    /// The name filter as text; `?name=42` arrives coerced to a number.
    fn name(&self) -> Option<String> {
        self.name.as_ref().map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// In-memory user store.
#[derive(Debug, Default)]
pub struct UserController {
    users: Mutex<BTreeMap<u64, User>>,
    next_id: AtomicU64,
}

impl UserController {
    fn list(&self, query: &ListQuery) -> (usize, Vec<User>) {
        let name = query.name();
        let users = self.users.lock();
        let matching: Vec<&User> = users
            .values()
            .filter(|u| name.as_deref().is_none_or(|n| u.name == n))
            .collect();
        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        (total, page)
    }

    fn find(&self, id: u64) -> Option<User> {
        self.users.lock().get(&id).cloned()
    }

    fn create(&self, name: String, email: Option<String>) -> User {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let now = Utc::now();
        let user = User {
            id,
            name,
            email,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().insert(id, user.clone());
        user
    }

    fn update(&self, id: u64, input: UserInput) -> Option<User> {
        let mut users = self.users.lock();
        let user = users.get_mut(&id)?;
        if let Some(name) = input.name {
            user.name = name;
        }
        if input.email.is_some() {
            user.email = input.email;
        }
        user.updated_at = Utc::now();
        Some(user.clone())
    }

    fn remove(&self, id: u64) -> Option<User> {
        self.users.lock().remove(&id)
    }
}

fn user_id(args: &Args, index: usize) -> Result<u64, DispatchError> {
    let raw: String = args.json(index)?;
    raw.parse()
        .map_err(|_| DispatchError::extraction(format!("invalid user id: {raw:?}")))
}

fn user_not_found(id: u64) -> DispatchError {
    DispatchError::handler(format!("user {id} not found")).with_status(StatusCode::NOT_FOUND)
}

async fn list_users(this: Arc<UserController>, args: Args) -> Result<Vec<User>, DispatchError> {
    let query: ListQuery = args.json(0)?;
    let (total, page) = this.list(&query);
    if let Some(shell) = args.response(1) {
        shell.set_header(
            http::HeaderName::from_static("x-total-count"),
            HeaderValue::from(total),
        );
    }
    Ok(page)
}

async fn find_user(this: Arc<UserController>, args: Args) -> Result<User, DispatchError> {
    let id = user_id(&args, 0)?;
    this.find(id).ok_or_else(|| user_not_found(id))
}

async fn create_user(this: Arc<UserController>, args: Args) -> Result<User, DispatchError> {
    let input: UserInput = args.json(0)?;
    let Some(name) = input.name.filter(|n| !n.trim().is_empty()) else {
        return Err(DispatchError::extraction("name is required"));
    };
    let user = this.create(name, input.email);
    if let Some(shell) = args.response(1) {
        shell.set_cookie(
            Cookie::new("last_user", user.id.to_string())
                .with_path("/")
                .http_only()
                .with_same_site(SameSite::Lax),
        );
    }
    Ok(user)
}

async fn update_user(this: Arc<UserController>, args: Args) -> Result<User, DispatchError> {
    let id = user_id(&args, 0)?;
    let input: UserInput = args.json(1)?;
    this.update(id, input).ok_or_else(|| user_not_found(id))
}

async fn remove_user(this: Arc<UserController>, args: Args) -> Result<Value, DispatchError> {
    let id = user_id(&args, 0)?;
    let user = this.remove(id).ok_or_else(|| user_not_found(id))?;
    Ok(json!({ "deleted": user.id }))
}

fn register_users(registry: &mut ControllerRegistry) {
    registry
        .register::<UserController>()
        .set_prefix("users")
        .route(Method::GET, "/", "list", list_users)
        .bind_param("list", 0, extractors::query(), Value::Null)
        .bind_param("list", 1, extractors::response(), Value::Null)
        .route(Method::GET, "/:id", "find", find_user)
        .bind_param("find", 0, extractors::param(), "id")
        .route(Method::POST, "/", "create", create_user)
        .bind_param("create", 0, extractors::body(), Value::Null)
        .bind_param("create", 1, extractors::response(), Value::Null)
        .route(Method::PUT, "/:id", "update", update_user)
        .bind_param("update", 0, extractors::param(), "id")
        .bind_param("update", 1, extractors::body(), Value::Null)
        .route(Method::DELETE, "/:id", "remove", remove_user)
        .bind_param("remove", 0, extractors::param(), "id");
}

// ---------------------------------------------------------------------------
// system
// ---------------------------------------------------------------------------

/// Server information and request introspection.
#[derive(Debug, Default)]
pub struct SystemController;

async fn info(_: Arc<SystemController>, args: Args) -> Result<Value, DispatchError> {
    let name: Option<String> = args.json(0)?;
    let started_at: Option<String> = args.json(1)?;
    Ok(json!({
        "name": name.unwrap_or_else(|| "routestack".to_owned()),
        "startedAt": started_at,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn whoami(_: Arc<SystemController>, args: Args) -> Result<Value, DispatchError> {
    let origin = args.value(0).cloned().unwrap_or(Value::Null);
    let headers = args.value(1).cloned().unwrap_or(Value::Null);
    let cookies = args.value(2).cloned().unwrap_or(Value::Null);
    let method = args
        .request(3)
        .map(|req| req.method().to_string())
        .unwrap_or_default();
    Ok(json!({
        "method": method,
        "origin": origin,
        "userAgent": headers.get("user-agent"),
        "cookies": cookies,
    }))
}

async fn echo(_: Arc<SystemController>, args: Args) -> Result<Value, DispatchError> {
    Ok(json!({
        "body": args.value(0),
        "query": args.value(1),
        "params": args.value(2),
    }))
}

fn origin() -> routestack_http::Extractor {
    extractor(|_, ctx: ExecutionContext| async move {
        let view = ctx.router();
        Ok(json!({
            "scheme": view.scheme,
            "host": view.host,
            "hostname": view.hostname,
            "port": view.port,
            "pathname": view.pathname,
            "route": view.route,
        })
        .into())
    })
}

async fn route_headers(ctx: ExecutionContext) -> Result<HeaderMap, DispatchError> {
    let mut headers = HeaderMap::new();
    headers.insert(http::header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    let route = HeaderValue::from_str(&ctx.router().route)
        .map_err(|e| DispatchError::internal(format!("route is not a header value: {e}")))?;
    headers.insert(http::HeaderName::from_static("x-route"), route);
    Ok(headers)
}

fn register_system(registry: &mut ControllerRegistry) {
    registry
        .register::<SystemController>()
        .set_prefix("system")
        .route(Method::GET, "/info", "info", info)
        .bind_param("info", 0, extractors::config(), "APP_NAME")
        .bind_param("info", 1, extractors::config(), "STARTED_AT")
        .merge_response_meta(
            "info",
            ResponseMeta::new().headers(HeaderSource::computed(route_headers)),
        )
        .route(Method::GET, "/whoami", "whoami", whoami)
        .bind_param("whoami", 0, origin(), Value::Null)
        .bind_param("whoami", 1, extractors::headers(), Value::Null)
        .bind_param("whoami", 2, extractors::cookies(), Value::Null)
        .bind_param("whoami", 3, extractors::request(), Value::Null)
        .route(Method::POST, "/echo/:tag", "echo", echo)
        .bind_param("echo", 0, extractors::body(), Value::Null)
        .bind_param("echo", 1, extractors::query(), Value::Null)
        .bind_param("echo", 2, extractors::params(), Value::Null)
        .merge_response_meta(
            "echo",
            ResponseMeta::new()
                .status(StatusCode::OK)
                .status_text("Echoed")
                .cookies(vec![Cookie::new("echoed", "1").with_path("/")]),
        );
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http_body_util::BodyExt;
    use routestack_core::Configuration;
    use routestack_http::{
        Application, ApplicationOptions, ResponseBody, RouteStackHttpConfig, RouteStackHttpService,
    };

    use super::*;

    fn service() -> RouteStackHttpService {
        let mut registry = ControllerRegistry::new();
        register(&mut registry);
        let app = Arc::new(Application::new(
            Arc::new(registry),
            ApplicationOptions::new().base_config(Configuration::from_pairs([
                ("APP_NAME", "demo"),
                ("STARTED_AT", "2026-01-01T00:00:00Z"),
            ])),
        ));
        RouteStackHttpService::new(&app, RouteStackHttpConfig::default())
    }

    fn request(method: Method, uri: &str, body: &str) -> http::Request<Bytes> {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .header("host", "localhost:4566")
            .header("content-type", "application/json")
            .header("user-agent", "routestack-test")
            .body(Bytes::from(body.to_owned()))
            .unwrap()
    }

    async fn body_json(response: http::Response<ResponseBody>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_should_create_and_find_user() {
        let svc = service();

        let created = svc
            .handle(
                request(Method::POST, "/api/users", r#"{"name":"ada","email":"ada@example.com"}"#),
                "r1",
            )
            .await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let cookie = created.headers().get(http::header::SET_COOKIE).unwrap();
        assert!(cookie.to_str().unwrap().starts_with("last_user=1"));
        let user = body_json(created).await;
        assert_eq!(user["id"], 1);
        assert_eq!(user["name"], "ada");

        let found = svc.handle(request(Method::GET, "/api/users/1", ""), "r2").await;
        assert_eq!(found.status(), StatusCode::OK);
        assert_eq!(body_json(found).await["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn test_should_page_users_and_report_total() {
        let svc = service();
        for name in ["a", "b", "c"] {
            let body = format!(r#"{{"name":"{name}"}}"#);
            svc.handle(request(Method::POST, "/api/users", &body), "r").await;
        }

        let response = svc
            .handle(request(Method::GET, "/api/users?limit=2&offset=1", ""), "r")
            .await;
        assert_eq!(response.headers().get("x-total-count").unwrap(), "3");
        let page = body_json(response).await;
        assert_eq!(page.as_array().unwrap().len(), 2);
        assert_eq!(page[0]["name"], "b");
    }

    #[tokio::test]
    async fn test_should_filter_users_by_numeric_name() {
        let svc = service();
        for name in ["42", "ada"] {
            let body = format!(r#"{{"name":"{name}"}}"#);
            svc.handle(request(Method::POST, "/api/users", &body), "r").await;
        }

        let response = svc
            .handle(request(Method::GET, "/api/users?name=42", ""), "r")
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-total-count").unwrap(), "1");
        let page = body_json(response).await;
        assert_eq!(page[0]["name"], "42");
    }

    #[tokio::test]
    async fn test_should_update_and_remove_user() {
        let svc = service();
        svc.handle(request(Method::POST, "/api/users", r#"{"name":"old"}"#), "r")
            .await;

        let updated = svc
            .handle(request(Method::PUT, "/api/users/1", r#"{"name":"new"}"#), "r")
            .await;
        assert_eq!(updated.status(), StatusCode::OK);
        assert_eq!(body_json(updated).await["name"], "new");

        let removed = svc.handle(request(Method::DELETE, "/api/users/1", ""), "r").await;
        assert_eq!(body_json(removed).await, json!({"deleted": 1}));

        let missing = svc.handle(request(Method::GET, "/api/users/1", ""), "r").await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(missing).await["code"], "HandlerFault");
    }

    #[tokio::test]
    async fn test_should_reject_invalid_input() {
        let svc = service();

        let nameless = svc
            .handle(request(Method::POST, "/api/users", r#"{"email":"x@y"}"#), "r")
            .await;
        assert_eq!(nameless.status(), StatusCode::BAD_REQUEST);

        let bad_id = svc.handle(request(Method::GET, "/api/users/abc", ""), "r").await;
        assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(bad_id).await["code"], "ExtractionFault");

        let bad_json = svc.handle(request(Method::POST, "/api/users", "{nope"), "r").await;
        assert_eq!(bad_json.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_should_report_info_with_computed_headers() {
        let response = service()
            .handle(request(Method::GET, "/api/system/info", ""), "r")
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("cache-control").unwrap(), "no-store");
        assert!(response.headers().contains_key("x-route"));
        let info = body_json(response).await;
        assert_eq!(info["name"], "demo");
        assert_eq!(info["startedAt"], "2026-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_should_introspect_request() {
        let mut req = request(Method::GET, "/api/system/whoami", "");
        req.headers_mut()
            .insert("cookie", HeaderValue::from_static("session=abc"));
        let response = service().handle(req, "r").await;
        let who = body_json(response).await;
        assert_eq!(who["method"], "GET");
        assert_eq!(who["origin"]["hostname"], "localhost");
        assert_eq!(who["origin"]["port"], 4566);
        assert_eq!(who["userAgent"], "routestack-test");
        assert_eq!(who["cookies"]["session"], "abc");
    }

    #[tokio::test]
    async fn test_should_apply_echo_metadata() {
        let response = service()
            .handle(
                request(Method::POST, "/api/system/echo/t1?x=1&flag=true", r#"{"a":[1,2]}"#),
                "r",
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookies: Vec<_> = response
            .headers()
            .get_all(http::header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_owned())
            .collect();
        assert!(cookies.iter().any(|c| c.starts_with("echoed=1")));
        let echoed = body_json(response).await;
        assert_eq!(echoed["body"], json!({"a": [1, 2]}));
        assert_eq!(echoed["query"], json!({"x": 1, "flag": true}));
        assert_eq!(echoed["params"]["tag"], "t1");
    }
}
