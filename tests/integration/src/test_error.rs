//! Error handling integration tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::Method;
    use routestack_http::{Application, Args, DispatchError, RouteStackHttpConfig};
    use serde_json::Value;

    use crate::{catalog_registry, catalog_server, client, fixture_options, spawn_server};

    #[tokio::test]
    async fn test_should_surface_handler_failure() {
        let server = catalog_server(fixture_options()).await.unwrap();

        let response = client()
            .delete(server.url("/api/catalog/items/1"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "HandlerFault");
        assert_eq!(body["message"], "items are immutable");
    }

    #[tokio::test]
    async fn test_should_reject_malformed_json_body() {
        let server = catalog_server(fixture_options()).await.unwrap();

        let response = client()
            .post(server.url("/api/catalog/items"))
            .header("content-type", "application/json")
            .body("{\"name\":")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "ExtractionFault");
    }

    #[tokio::test]
    async fn test_should_reject_unsupported_method() {
        let server = catalog_server(fixture_options()).await.unwrap();

        let response = client()
            .request(
                reqwest::Method::from_bytes(b"PURGE").unwrap(),
                server.url("/api/catalog/items"),
            )
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 405);
        assert!(response.headers().contains_key("allow"));
    }

    #[tokio::test]
    async fn test_should_reject_paths_outside_mount() {
        let server = catalog_server(fixture_options()).await.unwrap();

        let response = client()
            .get(server.url("/elsewhere/catalog/items"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 404);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "NoRoute");
    }

    #[tokio::test]
    async fn test_should_fault_on_controller_without_prefix() {
        #[derive(Debug, Default)]
        struct Unprefixed;

        let mut registry = catalog_registry();
        registry
            .register::<Unprefixed>()
            .route(Method::GET, "/x", "x", |_: Arc<Unprefixed>, _: Args| async move {
                Ok::<_, DispatchError>(Value::Null)
            });
        let app = Arc::new(Application::new(Arc::new(registry), fixture_options()));
        let server = spawn_server(&app, RouteStackHttpConfig::default())
            .await
            .unwrap();

        // Catalog is registered first and still matches.
        let ok = client()
            .get(server.url("/api/catalog/items/1"))
            .send()
            .await
            .unwrap();
        assert_eq!(ok.status(), 200);

        let response = client()
            .get(server.url("/api/other/x"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "ConfigurationFault");
    }
}
