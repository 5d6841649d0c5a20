//! Response assembly integration tests.

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::{catalog_server, client, fixture_options, set_cookies};

    #[tokio::test]
    async fn test_should_default_post_to_created() {
        let server = catalog_server(fixture_options()).await.unwrap();

        let response = client()
            .post(server.url("/api/catalog/items"))
            .json(&json!({"name": "lamp", "price": 12.5}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 201);
        assert_eq!(
            response.json::<Value>().await.unwrap(),
            json!({"created": {"name": "lamp", "price": 12.5}})
        );
    }

    #[tokio::test]
    async fn test_should_decode_text_body_as_string() {
        let server = catalog_server(fixture_options()).await.unwrap();

        let response = client()
            .post(server.url("/api/catalog/items"))
            .header("content-type", "text/plain; charset=utf-8")
            .body("just text")
            .send()
            .await
            .unwrap();

        assert_eq!(
            response.json::<Value>().await.unwrap(),
            json!({"created": "just text"})
        );
    }

    #[tokio::test]
    async fn test_should_apply_response_metadata() {
        let server = catalog_server(fixture_options()).await.unwrap();

        let response = client()
            .patch(server.url("/api/catalog/items/5"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 202);
        assert_eq!(response.headers().get("x-catalog").unwrap(), "1");
        let cookies = set_cookies(response.headers());
        assert!(cookies.iter().any(|c| c.starts_with("flavor=plain")));
        assert_eq!(
            response.json::<Value>().await.unwrap(),
            json!({"patched": "5"})
        );
    }

    #[tokio::test]
    async fn test_should_fold_staged_headers_and_cookies() {
        let server = catalog_server(fixture_options()).await.unwrap();

        let response = client()
            .get(server.url("/api/catalog/session"))
            .header("cookie", "theme=dark; lang=en")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers().get("x-session").unwrap(), "issued");
        let cookies = set_cookies(response.headers());
        assert!(cookies.iter().any(|c| c.starts_with("sid=s-1") && c.contains("HttpOnly")));
        assert!(cookies.iter().any(|c| c.starts_with("theme=dark")));
        assert!(cookies.iter().any(|c| c.starts_with("lang=en")));
        assert_eq!(
            response.json::<Value>().await.unwrap(),
            json!({"cookies": {"theme": "dark", "lang": "en"}})
        );
    }

    #[tokio::test]
    async fn test_should_tag_every_response_with_request_id() {
        let server = catalog_server(fixture_options()).await.unwrap();

        let response = client()
            .get(server.url("/api/catalog/items/1"))
            .send()
            .await
            .unwrap();

        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers().get("server").unwrap(), "RouteStack");
    }
}
