//! Body decoding through the dispatcher.

#[cfg(test)]
mod tests {
    use restdeck_core::ServerConfig;
    use serde_json::{Value, json};

    use crate::{TestServer, client, multipart_body};

    #[tokio::test]
    async fn test_should_decode_json_body() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let body: Value = client()
            .post(server.url("/echo"))
            .json(&json!({ "name": "John" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["contentType"], "application/json");
        assert_eq!(body["body"], json!({ "name": "John" }));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_reject_malformed_json() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let resp = client()
            .post(server.url("/echo"))
            .header("content-type", "application/json")
            .body("{\"name\":")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let body: Value = resp.json().await.unwrap();
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .starts_with("error parsing json")
        );

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_default_to_form_without_content_type() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let body: Value = client()
            .post(server.url("/echo"))
            .body("hello=world")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["contentType"], "application/x-www-form-urlencoded");
        assert_eq!(body["body"], json!({ "hello": "world" }));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_reject_bad_percent_escape() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let resp = client()
            .post(server.url("/echo"))
            .header("content-type", "application/x-www-form-urlencoded")
            .body("a=%zz")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "error parsing urlencoded form");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_leave_unknown_content_type_unread() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let body: Value = client()
            .post(server.url("/echo"))
            .header("content-type", "text/plain")
            .body("just text")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({ "contentType": "", "body": null }));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_require_multipart_boundary() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let resp = client()
            .post(server.url("/echo"))
            .header("content-type", "multipart/form-data")
            .body(multipart_body("abc", "a.txt", b"hi"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "missing boundary");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_decode_small_multipart_in_memory() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let body: Value = client()
            .post(server.url("/echo"))
            .header("content-type", "multipart/form-data; boundary=\"abc123\"")
            .body(multipart_body("abc123", "notes.txt", b"hello multipart"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["contentType"], "multipart/form-data");
        assert_eq!(body["body"]["fields"], json!({ "title": "report" }));

        let file = &body["body"]["files"][0];
        assert_eq!(file["field"], "doc");
        assert_eq!(file["fileName"], "notes.txt");
        assert_eq!(file["contentType"], "text/plain");
        assert_eq!(file["size"], 15);
        assert_eq!(file["inMemory"], true);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_spill_past_resource_ceiling() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;
        let payload = vec![b'z'; 2 * 1_048_576];

        // `/upload` allows 1 MB in memory.
        let body: Value = client()
            .post(server.url("/upload"))
            .header("content-type", "multipart/form-data; boundary=spill")
            .body(multipart_body("spill", "big.txt", &payload))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let file = &body["body"]["files"][0];
        assert_eq!(file["size"], 2 * 1_048_576);
        assert_eq!(file["inMemory"], false);

        // `/echo` uses the server's 10 MB ceiling.
        let body: Value = client()
            .post(server.url("/echo"))
            .header("content-type", "multipart/form-data; boundary=spill")
            .body(multipart_body("spill", "big.txt", &payload))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["body"]["files"][0]["inMemory"], true);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_reject_truncated_multipart() {
        let server = TestServer::with_fixtures(ServerConfig::default()).await;

        let mut payload = multipart_body("cut", "a.txt", b"data");
        payload.truncate(payload.len() - 10);

        let resp = client()
            .post(server.url("/echo"))
            .header("content-type", "multipart/form-data; boundary=cut")
            .body(payload)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "error parsing multipart/form-data");

        server.stop().await;
    }
}
