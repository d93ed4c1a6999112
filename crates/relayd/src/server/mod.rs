//! TCP listener for the chat relay.
//!
//! The server:
//! - Binds the listening port at startup (failure is fatal)
//! - Spawns a ConnectionHandler task for each accepted client
//! - Keeps accepting when a single accept or connection fails
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │   (per client)  │     │                 │
//! └───────┬─────────┘     └─────────────────┘
//!         │ route / announce
//!         ▼
//! ┌─────────────────┐
//! │ Session queues  │
//! │ (other clients) │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and allow continued operation

mod connection;

pub use connection::{ConnectionError, ConnectionHandler, ConnectionState};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use relay_core::ConnectionId;

use crate::config::RelayConfig;
use crate::registry::RegistryHandle;

/// TCP server for the chat relay.
///
/// Owns the listening socket; every accepted connection runs on its own task.
pub struct RelayServer {
    /// Bound listening socket
    listener: TcpListener,

    /// Settings applied to each connection
    config: RelayConfig,

    /// Handle to the identity registry
    registry: RegistryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating connection IDs
    connection_counter: AtomicU64,
}

impl RelayServer {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// - `ServerError::Bind` if the address cannot be bound; the relay
    ///   cannot run without its port
    pub async fn bind(
        config: RelayConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|e| ServerError::Bind {
                addr: config.listen,
                error: e.to_string(),
            })?;

        Ok(Self {
            listener,
            config,
            registry,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Returns the address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::LocalAddr(e.to_string()))
    }

    /// Runs the server.
    ///
    /// Accepts connections until the cancellation token is triggered.
    /// Connections already being served keep running on their own tasks.
    pub async fn run(&self) -> Result<(), ServerError> {
        info!(
            addr = %self.local_addr()?,
            "Relay server listening"
        );

        // Accept connections until cancelled
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let raw = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, peer, ConnectionId::new(raw));
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        info!(
            connections = self.connection_counter.load(Ordering::Relaxed),
            "Relay server stopped"
        );
        Ok(())
    }

    /// Handles a new client connection by spawning a handler task.
    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr, id: ConnectionId) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(connection = %id, error = %e, "Failed to set TCP_NODELAY");
        }

        let (reader, writer) = stream.into_split();
        let handler = ConnectionHandler::new(
            id,
            reader,
            writer,
            self.registry.clone(),
            self.config.max_line_length,
        )
        .with_idle_timeout(self.config.idle_timeout());

        info!(connection = %id, peer = %peer, "Accepted connection");

        tokio::spawn(async move {
            let nickname = handler.run().await;
            debug!(connection = %id, peer = %peer, nickname = ?nickname, "Connection task finished");
        });
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("Failed to read local address: {0}")]
    LocalAddr(String),
}
