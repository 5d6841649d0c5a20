//! Configuration integration tests.

#[cfg(test)]
mod tests {
    use routestack_core::{Configuration, CoreError, initializer};
    use routestack_http::ApplicationOptions;
    use serde_json::{Value, json};

    use crate::{catalog_server, client, fixture_options};

    #[tokio::test]
    async fn test_should_coerce_configuration_values() {
        let server = catalog_server(fixture_options()).await.unwrap();

        let body: Value = client()
            .get(server.url("/api/catalog/flags"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(
            body,
            json!({"featureFlag": true, "region": "eu-west-1", "missing": null})
        );
    }

    #[tokio::test]
    async fn test_should_merge_initializer_values() {
        let options = fixture_options().initializer(
            "REGION",
            initializer(|config: Configuration| async move {
                let size = config.get_as::<u64>("PAGE_SIZE").unwrap_or_default();
                Ok(json!(format!("computed-{size}")))
            }),
        );
        let server = catalog_server(options).await.unwrap();

        let body: Value = client()
            .get(server.url("/api/catalog/flags"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["region"], "computed-25");
    }

    #[tokio::test]
    async fn test_should_compute_prefix_from_configuration() {
        let options = ApplicationOptions::new()
            .base_config(Configuration::from_pairs([("API_VERSION", "v3")]))
            .prefix_with(|config: Configuration| async move {
                Ok(config
                    .get("API_VERSION")
                    .and_then(|v| v.as_str().map(str::to_owned))
                    .unwrap_or_default())
            });
        let server = catalog_server(options).await.unwrap();

        let body: Value = client()
            .get(server.url("/api/v3/catalog/items/11"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body, json!({"id": "11"}));
    }

    #[tokio::test]
    async fn test_should_fail_requests_when_initializer_fails() {
        let options = fixture_options().initializer(
            "BROKEN",
            initializer(|_| async { Err(CoreError::initializer("BROKEN", "vault unreachable")) }),
        );
        let server = catalog_server(options).await.unwrap();

        let response = client()
            .get(server.url("/api/catalog/items/1"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "Internal");
    }
}
