//! Routing integration tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use routestack_http::{Application, ApplicationOptions, RouteStackHttpConfig};
    use serde_json::{Value, json};

    use crate::{catalog_registry, catalog_server, client, fixture_options, spawn_server};

    #[tokio::test]
    async fn test_should_route_to_capture_handler() {
        let server = catalog_server(fixture_options()).await.unwrap();

        let response = client()
            .get(server.url("/api/catalog/items/42"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"id": "42"}));
    }

    #[tokio::test]
    async fn test_should_capture_multiple_params() {
        let server = catalog_server(fixture_options()).await.unwrap();

        let body: Value = client()
            .get(server.url("/api/catalog/items/7/tags/blue"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body, json!({"id": "7", "tag": "blue"}));
    }

    #[tokio::test]
    async fn test_should_decode_nested_query() {
        let server = catalog_server(fixture_options()).await.unwrap();

        let body: Value = client()
            .get(server.url(
                "/api/catalog/items?limit=10&active=true&tags%5B%5D=a&tags%5B%5D=b&filter%5Bname%5D=x%20y&empty=",
            ))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(
            body["query"],
            json!({
                "limit": 10,
                "active": true,
                "tags": ["a", "b"],
                "filter": {"name": "x y"},
                "empty": "",
            })
        );
        assert_eq!(body["pageSize"], 25);
    }

    #[tokio::test]
    async fn test_should_return_empty_response_for_unmatched_route() {
        let server = catalog_server(fixture_options()).await.unwrap();

        let response = client()
            .get(server.url("/api/inventory/items"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert!(response.headers().get("content-type").is_none());
        assert!(response.bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_should_return_empty_response_for_unmatched_method() {
        let server = catalog_server(fixture_options()).await.unwrap();

        let response = client()
            .put(server.url("/api/catalog/items/1"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert!(response.bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_should_apply_application_prefix() {
        let server = catalog_server(fixture_options().prefix("v1")).await.unwrap();

        let hit = client()
            .get(server.url("/api/v1/catalog/items/9"))
            .send()
            .await
            .unwrap();
        assert_eq!(hit.json::<Value>().await.unwrap(), json!({"id": "9"}));

        let miss = client()
            .get(server.url("/api/catalog/items/9"))
            .send()
            .await
            .unwrap();
        assert!(miss.bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_should_mount_at_custom_path() {
        let app = Arc::new(Application::new(
            Arc::new(catalog_registry()),
            fixture_options(),
        ));
        let server = spawn_server(
            &app,
            RouteStackHttpConfig {
                mount: "/gateway".to_owned(),
            },
        )
        .await
        .unwrap();

        let body: Value = client()
            .get(server.url("/gateway/catalog/items/3"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["id"], "3");
    }

    #[tokio::test]
    async fn test_should_only_consider_listed_controllers() {
        #[derive(Debug, Default)]
        struct Unlisted;

        let options = ApplicationOptions::new()
            .base_config(routestack_core::Configuration::new())
            .controller::<Unlisted>();
        let server = catalog_server(options).await.unwrap();

        let response = client()
            .get(server.url("/api/catalog/items/1"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert!(response.bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_should_serve_health_endpoint() {
        let server = catalog_server(fixture_options()).await.unwrap();

        let body: Value = client()
            .get(server.url("/_routestack/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["status"], "running");
    }
}
