//! Integration tests for RestDeck.
//!
//! Every test binds its own server on `127.0.0.1:0` in-process and talks to
//! it over TCP with `reqwest`, so no external server is needed.
//!
//! Run them with:
//! ```text
//! cargo test -p restdeck-integration
//! ```

use std::net::SocketAddr;
use std::sync::Once;

use http::StatusCode;
use restdeck_core::{HttpError, ServerConfig};
use restdeck_http::dispatch::DispatcherBuilder;
use restdeck_http::{Dispatcher, RequestContext, Resource, ResourceResponse, Server, ServerHandle};
use serde_json::json;
use tokio::task::JoinHandle;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A server running on an ephemeral port for the duration of a test.
#[derive(Debug)]
pub struct TestServer {
    addr: SocketAddr,
    handle: ServerHandle,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Build `builder` and serve it on `127.0.0.1:0`.
    pub async fn start(builder: DispatcherBuilder) -> Self {
        init_tracing();

        let dispatcher = builder.build().expect("dispatcher should build");
        let server = Server::bind(([127, 0, 0, 1], 0).into(), dispatcher)
            .await
            .expect("server should bind");
        let addr = server.local_addr();
        let handle = server.handle();
        let task = tokio::spawn(server.run());

        Self { addr, handle, task }
    }

    /// Serve the [`fixture_resources`] with `config`.
    pub async fn with_fixtures(config: ServerConfig) -> Self {
        Self::start(fixture_builder(config)).await
    }

    /// Absolute URL for `path` on this server.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// The bound address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// A handle to close the server.
    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Close the server and wait for the accept loop to finish.
    pub async fn stop(self) {
        self.handle.close();
        self.task.await.expect("server task should not panic");
    }
}

/// A fresh HTTP client.
#[must_use]
pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

/// A dispatcher builder pre-loaded with [`fixture_resources`].
#[must_use]
pub fn fixture_builder(config: ServerConfig) -> DispatcherBuilder {
    fixture_resources()
        .into_iter()
        .fold(Dispatcher::builder(config), DispatcherBuilder::resource)
}

/// Resources shared by the integration tests, in registration order.
#[must_use]
pub fn fixture_resources() -> Vec<Resource> {
    vec![
        Resource::builder("hello")
            .path("/hello/:thing/:greeting")
            .get(hello)
            .build()
            .expect("hello resource"),
        Resource::builder("new-user")
            .path("/users/new")
            .get(|_ctx: RequestContext| async { ResourceResponse::json(&json!({ "form": true })) })
            .build()
            .expect("new-user resource"),
        Resource::builder("user")
            .path("/users/:id")
            .get(|ctx: RequestContext| async move {
                ResourceResponse::json(&json!({ "id": ctx.path_param("id") }))
            })
            .put(|ctx: RequestContext| async move {
                ResourceResponse::json(&json!({ "id": ctx.path_param("id"), "updated": true }))
            })
            .build()
            .expect("user resource"),
        Resource::builder("echo")
            .path("/echo")
            .post(echo)
            .build()
            .expect("echo resource"),
        Resource::builder("upload")
            .path("/upload")
            .post(echo)
            .multipart_memory_mb(1)
            .build()
            .expect("upload resource"),
        Resource::builder("inspect")
            .path("/inspect")
            .get(inspect)
            .build()
            .expect("inspect resource"),
        Resource::builder("conflict")
            .path("/conflict")
            .post(conflict)
            .build()
            .expect("conflict resource"),
        Resource::builder("raw")
            .path("/raw")
            .get(raw)
            .build()
            .expect("raw resource"),
    ]
}

async fn hello(ctx: RequestContext) -> Result<ResourceResponse, HttpError> {
    ResourceResponse::json(&ctx.path_params().to_map())
}

async fn conflict(_ctx: RequestContext) -> Result<ResourceResponse, HttpError> {
    Err(HttpError::status(StatusCode::CONFLICT, "already exists"))
}

/// A body without a content type.
async fn raw(_ctx: RequestContext) -> Result<ResourceResponse, HttpError> {
    Ok(ResourceResponse::ok().with_body("<p>raw</p>"))
}

/// Describe the decoded body.
async fn echo(ctx: RequestContext) -> Result<ResourceResponse, HttpError> {
    let body = ctx.body();
    let decoded = if let Some(value) = body.as_json() {
        value.clone()
    } else if let Some(fields) = body.as_form() {
        json!(fields.to_map())
    } else if let Some(form) = body.as_multipart() {
        let files: Vec<_> = form
            .files
            .iter()
            .map(|f| {
                json!({
                    "field": f.field_name,
                    "fileName": f.file_name,
                    "contentType": f.content_type,
                    "size": f.size(),
                    "inMemory": f.is_in_memory(),
                })
            })
            .collect();
        json!({ "fields": form.fields.to_map(), "files": files })
    } else {
        serde_json::Value::Null
    };

    ResourceResponse::json(&json!({
        "contentType": body.content_type(),
        "body": decoded,
    }))
}

/// Report what the context derived from the request.
async fn inspect(ctx: RequestContext) -> Result<ResourceResponse, HttpError> {
    let url = ctx.url();
    ResourceResponse::json(&json!({
        "method": ctx.method().as_str(),
        "scheme": url.scheme().as_str(),
        "host": url.host(),
        "port": url.port(),
        "path": url.path(),
        "query": url.query(),
        "page": ctx.query_param("page"),
        "acceptsJson": ctx.accepts(&["application/json"]),
        "session": ctx.cookie("session"),
        "resource": ctx.resource().name(),
    }))
}

/// Build a multipart body with one text field and one file part.
#[must_use]
pub fn multipart_body(boundary: &str, file_name: &str, content: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"title\"\r\n\r\n\
         report\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"doc\"; filename=\"{file_name}\"\r\n\
         Content-Type: text/plain\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

mod test_body;
mod test_context;
mod test_hooks;
mod test_lifecycle;
mod test_routing;
