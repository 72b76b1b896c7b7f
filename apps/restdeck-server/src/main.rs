//! RestDeck Server - demo binary for the RestDeck dispatcher.
//!
//! Registers a few example resources and serves them until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! LISTEN_ADDR=0.0.0.0:1337 restdeck-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LISTEN_ADDR` | `0.0.0.0:1337` | Bind address |
//! | `SCHEME` | `http` | Scheme reported in request URLs |
//! | `MULTIPART_MEMORY_MB` | `10` | In-memory multipart ceiling |
//! | `DEFAULT_RESPONSE_CONTENT_TYPE` | `application/json` | Content type for responses that set none |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod access_log;
mod resources;

use anyhow::{Context, Result};
use restdeck_core::ServerConfig;
use restdeck_http::{Dispatcher, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::access_log::AccessLog;
use crate::resources::{VERSION, demo_resources};

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Build the dispatcher with every demo resource and the access log.
fn build_dispatcher(config: ServerConfig) -> Result<Dispatcher> {
    let builder = demo_resources()
        .context("invalid demo resource")?
        .into_iter()
        .fold(Dispatcher::builder(config), |builder, resource| {
            builder.resource(resource)
        });

    builder
        .hook(AccessLog)
        .build()
        .context("failed to build dispatcher")
}

/// Probe `/health` on the configured address.
///
/// Succeeds on a `200 OK` whose body reports `"running"`.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.starts_with("HTTP/1.1 200") && response.contains("\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env().context("invalid server configuration")?;

    // Handle --health-check flag for Docker HEALTHCHECK.
    if std::env::args().any(|a| a == "--health-check") {
        let addr = config.listen_addr.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&config.log_level)?;

    let addr = config.socket_addr().context("invalid bind address")?;
    let multipart_memory_mb = config.multipart_memory_mb;
    let dispatcher = build_dispatcher(config)?;
    let resource_names: Vec<&str> = dispatcher
        .registry()
        .resources()
        .iter()
        .map(|r| r.name())
        .collect();

    info!(
        %addr,
        resources = ?resource_names,
        multipart_memory_mb,
        version = VERSION,
        "starting RestDeck Server",
    );

    let server = Server::bind(addr, dispatcher)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    let handle = server.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal, draining connections");
        }
        handle.close();
    });

    server.run().await;
    Ok(())
}
