//! Lifecycle hooks around real requests.

#[cfg(test)]
mod tests {
    use http::{HeaderValue, Response, StatusCode};
    use restdeck_core::{HttpError, RestDeckError, RestDeckResult, ServerConfig};
    use restdeck_http::LifecycleHook;
    use restdeck_http::body::ResponseBody;
    use restdeck_http::request::RequestHead;
    use serde_json::{Value, json};

    use crate::{TestServer, client, fixture_builder};

    struct ApiKeyGate;

    impl LifecycleHook for ApiKeyGate {
        fn name(&self) -> &str {
            "api-key-gate"
        }

        fn before_request(&self, head: &RequestHead) -> Result<(), HttpError> {
            if !head.path().starts_with("/users") || head.header("x-api-key").is_some() {
                return Ok(());
            }
            Err(HttpError::status(StatusCode::UNAUTHORIZED, "missing api key"))
        }
    }

    struct Stamp;

    impl LifecycleHook for Stamp {
        fn name(&self) -> &str {
            "stamp"
        }

        fn after_request(&self, _head: &RequestHead, response: &mut Response<ResponseBody>) {
            response
                .headers_mut()
                .insert("x-stamped", HeaderValue::from_static("yes"));
        }
    }

    struct NeedsDatabase;

    impl LifecycleHook for NeedsDatabase {
        fn name(&self) -> &str {
            "needs-database"
        }

        fn setup(&self) -> RestDeckResult<()> {
            Err(RestDeckError::HookSetup {
                hook: self.name().to_owned(),
                reason: "database unreachable".to_owned(),
            })
        }
    }

    #[tokio::test]
    async fn test_should_reject_in_before_hook() {
        let builder = fixture_builder(ServerConfig::default())
            .hook(ApiKeyGate)
            .hook(Stamp);
        let server = TestServer::start(builder).await;

        let resp = client().get(server.url("/users/1")).send().await.unwrap();
        assert_eq!(resp.status(), 401);
        assert_eq!(resp.headers()["x-stamped"], "yes");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "status": 401, "message": "missing api key" }));

        let resp = client()
            .get(server.url("/users/1"))
            .header("x-api-key", "secret")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["x-stamped"], "yes");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_should_run_after_hooks_on_not_found() {
        let builder = fixture_builder(ServerConfig::default()).hook(Stamp);
        let server = TestServer::start(builder).await;

        let resp = client().get(server.url("/missing")).send().await.unwrap();
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.headers()["x-stamped"], "yes");

        server.stop().await;
    }

    #[test]
    fn test_should_fail_build_when_hook_setup_fails() {
        let err = fixture_builder(ServerConfig::default())
            .hook(NeedsDatabase)
            .build()
            .unwrap_err();
        assert!(matches!(err, RestDeckError::HookSetup { .. }));
    }
}
