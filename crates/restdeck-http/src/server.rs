//! TCP accept loop.
//!
//! Each accepted connection is served on its own task by the `hyper-util`
//! auto builder (HTTP/1.1 and HTTP/2). Closing the server stops accepting and
//! waits for in-flight connections to drain.

use std::net::SocketAddr;
use std::sync::Arc;

use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use restdeck_core::{RestDeckError, RestDeckResult};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::dispatch::Dispatcher;
use crate::service::RestDeckService;

/// A bound listener serving a [`Dispatcher`].
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    service: RestDeckService,
    shutdown: Arc<watch::Sender<bool>>,
}

/// Closes a running [`Server`] from elsewhere.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl ServerHandle {
    /// Stop accepting connections.
    ///
    /// Closing an already closed server does nothing.
    pub fn close(&self) {
        let was_closed = self.shutdown.send_replace(true);
        if !was_closed {
            info!("server close requested");
        }
    }

    /// Whether [`ServerHandle::close`] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }
}

impl Server {
    /// Bind `addr`. Port 0 picks a free port; see [`Server::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns [`RestDeckError::Listener`] if the address cannot be bound.
    pub async fn bind(addr: SocketAddr, dispatcher: Dispatcher) -> RestDeckResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RestDeckError::Listener {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| RestDeckError::Listener {
                addr: addr.to_string(),
                source,
            })?;
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            listener,
            local_addr,
            service: RestDeckService::new(dispatcher),
            shutdown: Arc::new(shutdown),
        })
    }

    /// The address actually bound.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A handle that can close the server.
    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Serve connections until the server is closed, then drain.
    pub async fn run(self) {
        let graceful = GracefulShutdown::new();
        let http = HttpConnBuilder::new(TokioExecutor::new());

        let mut closed = self.shutdown.subscribe();
        let shutdown = async move {
            // The sender lives in `self`, so this only ends on close.
            let _ = closed.wait_for(|closed| *closed).await;
        };
        tokio::pin!(shutdown);

        info!(addr = %self.local_addr, "listening");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "failed to accept connection");
                            continue;
                        }
                    };
                    debug!(%peer_addr, "accepted connection");

                    let svc = self.service.clone();
                    let conn = http.serve_connection(TokioIo::new(stream), svc);
                    let conn = graceful.watch(conn.into_owned());

                    tokio::spawn(async move {
                        if let Err(e) = conn.await {
                            error!(%peer_addr, error = %e, "connection error");
                        }
                    });
                }

                () = &mut shutdown => {
                    info!("shutting down gracefully");
                    break;
                }
            }
        }

        drop(self.listener);
        graceful.shutdown().await;
        info!("all connections drained");
    }
}
