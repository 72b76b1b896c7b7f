//! Resolution and method dispatch over real connections.

#[cfg(test)]
mod tests {
    use restdeck_core::ServerConfig;
    use serde_json::{Value, json};

    use crate::{TestServer, client};

    #[tokio::test]
    async fn test_should_return_json_404_for_unregistered_path() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let resp = client().get(server.url("/nowhere")).send().await.unwrap();
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.headers()["content-type"], "application/json");
        assert_eq!(resp.headers()["server"], "RestDeck");
        assert!(resp.headers().contains_key("x-request-id"));

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "status": 404, "message": "Not Found" }));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_return_405_with_allow_header() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let resp = client().delete(server.url("/users/7")).send().await.unwrap();
        assert_eq!(resp.status(), 405);
        assert_eq!(resp.headers()["allow"], "GET, PUT");

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], 405);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_capture_path_params() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let body: Value = client()
            .get(server.url("/hello/world/i-love-you"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({ "thing": "world", "greeting": "i-love-you" }));

        let resp = client().get(server.url("/hello/world")).send().await.unwrap();
        assert_eq!(resp.status(), 404);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_resolve_in_registration_order() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let body: Value = client()
            .get(server.url("/users/new"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({ "form": true }));

        let body: Value = client()
            .get(server.url("/users/42/"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({ "id": "42" }));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_uppercase_request_method() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let method = reqwest::Method::from_bytes(b"put").unwrap();
        let resp = client()
            .request(method, server.url("/users/5"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "id": "5", "updated": true }));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_pass_handler_status_through() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let resp = client().post(server.url("/conflict")).send().await.unwrap();
        assert_eq!(resp.status(), 409);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "status": 409, "message": "already exists" }));

        server.stop().await;
    }
}
