//! Request context derivation: URL parts, content negotiation, cookies.

#[cfg(test)]
mod tests {
    use restdeck_core::{Scheme, ServerConfig};
    use serde_json::{Value, json};

    use crate::{TestServer, client};

    #[tokio::test]
    async fn test_should_expose_url_parts_and_headers() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let body: Value = client()
            .get(server.url("/inspect?page=2&sort=name"))
            .header("accept", "application/json;text/html")
            .header("cookie", "theme=dark; session=abc123")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(
            body,
            json!({
                "method": "GET",
                "scheme": "http",
                "host": "127.0.0.1",
                "port": server.addr().port(),
                "path": "/inspect",
                "query": "page=2&sort=name",
                "page": "2",
                "acceptsJson": true,
                "session": "abc123",
                "resource": "inspect",
            })
        );

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_not_accept_unlisted_types() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let body: Value = client()
            .get(server.url("/inspect"))
            .header("accept", "text/xml")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["acceptsJson"], false);
        assert_eq!(body["session"], Value::Null);
        assert_eq!(body["query"], Value::Null);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_use_scheme_default_port() {
        let config = ServerConfig {
            scheme: Scheme::Https,
            ..ServerConfig::default()
        };
        let server = TestServer::with_fixtures(config).await;

        let body: Value = client()
            .get(server.url("/inspect"))
            .header("host", "api.example.com")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["scheme"], "https");
        assert_eq!(body["host"], "api.example.com");
        assert_eq!(body["port"], 443);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_apply_default_response_content_type() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;
        let resp = client().get(server.url("/raw")).send().await.unwrap();
        assert_eq!(resp.headers()["content-type"], "application/json");
        assert_eq!(resp.text().await.unwrap(), "<p>raw</p>");
        server.stop().await;

        let config = ServerConfig {
            default_response_content_type: "text/html; charset=utf-8".to_owned(),
            ..ServerConfig::default()
        };
        let server = TestServer::with_fixtures(config).await;
        let resp = client().get(server.url("/raw")).send().await.unwrap();
        assert_eq!(resp.headers()["content-type"], "text/html; charset=utf-8");
        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_assign_distinct_request_ids() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let first = client().get(server.url("/raw")).send().await.unwrap();
        let second = client().get(server.url("/raw")).send().await.unwrap();
        assert_ne!(
            first.headers()["x-request-id"],
            second.headers()["x-request-id"]
        );

        server.stop().await;
    }
}
