//! Server start-up and shutdown.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use restdeck_core::{HttpError, RestDeckError, ServerConfig};
    use restdeck_http::{RequestContext, Resource, ResourceResponse};

    use crate::{TestServer, client, fixture_builder, fixture_resources};

    async fn slow(_ctx: RequestContext) -> Result<ResourceResponse, HttpError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(ResourceResponse::text("done"))
    }

    #[tokio::test]
    async fn test_should_drain_in_flight_requests_on_close() {
        let slow_resource = Resource::builder("slow")
            .path("/slow")
            .get(slow)
            .build()
            .unwrap();
        let builder = fixture_builder(ServerConfig::default()).resource(slow_resource);
        let server = TestServer::start(builder).await;

        let url = server.url("/slow");
        let request = tokio::spawn(async move { client().get(url).send().await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let handle = server.handle();
        handle.close();
        handle.close();
        assert!(handle.is_closed());

        let resp = request.await.unwrap().unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), "done");

        let addr = server.addr();
        tokio::time::timeout(Duration::from_secs(5), server.stop())
            .await
            .unwrap();

        assert!(
            tokio::net::TcpStream::connect(addr).await.is_err(),
            "listener should be closed"
        );
    }

    #[test]
    fn test_should_refuse_duplicate_patterns_at_startup() {
        let duplicate = Resource::builder("impostor")
            .path("/users/:id")
            .get(|_ctx: RequestContext| async { ResourceResponse::json(&"impostor") })
            .build()
            .unwrap();
        let err = fixture_resources()
            .into_iter()
            .chain(std::iter::once(duplicate))
            .fold(
                restdeck_http::Dispatcher::builder(ServerConfig::default()),
                restdeck_http::DispatcherBuilder::resource,
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, RestDeckError::DuplicatePattern { .. }));
    }
}
