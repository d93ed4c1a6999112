//! Connection handler for individual client connections.
//!
//! Each client connection gets its own `ConnectionHandler` that drives it
//! through a small state machine:
//!
//! ```text
//! Connecting ──▶ AwaitingNickname ──▶ Registered ──▶ Closed
//!                       │                              ▲
//!                       └────────▶ Rejected ───────────┘
//! ```
//!
//! - The first line is the nickname claim
//! - Every later line goes to the [`MessageRouter`]
//! - Teardown (close handle, unregister, departure notice, roster refresh)
//!   runs once, whichever way the connection ended
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::fmt;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use relay_core::{ConnectionId, DomainError, Nickname};
use relay_protocol::ServerMessage;

use crate::presence::PresenceBroadcaster;
use crate::registry::{RegistryError, RegistryHandle};
use crate::router::MessageRouter;
use crate::session::{outbound_channel, Session, SessionWriter};

/// Result of the per-session writer task
type WriterTask = JoinHandle<Result<(), LinesCodecError>>;

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, nothing read yet
    Connecting,
    /// Waiting for the nickname line
    AwaitingNickname,
    /// Nickname claimed; lines are being routed
    Registered,
    /// Nickname claim lost
    Rejected,
    /// Finished; nothing more happens on this connection
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::AwaitingNickname => "awaiting-nickname",
            Self::Registered => "registered",
            Self::Rejected => "rejected",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Connection handler for a single client.
pub struct ConnectionHandler<R, W> {
    /// Identifier assigned by the listener
    id: ConnectionId,

    /// Line reader over the inbound half
    reader: FramedRead<R, LinesCodec>,

    /// Outbound half until it is handed to the session writer
    writer: Option<W>,

    /// Handle to the identity registry
    registry: RegistryHandle,

    /// Routes lines from this client
    router: MessageRouter,

    /// Announces joins and departures
    presence: PresenceBroadcaster,

    /// Close after this long without a line (None = never)
    idle_timeout: Option<Duration>,

    /// Current lifecycle state
    state: ConnectionState,

    /// The registered session, taken exactly once by `close`
    session: Option<Session>,

    /// Drains the session's outbound queue into `writer`
    writer_task: Option<WriterTask>,
}

impl<R, W> ConnectionHandler<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier assigned by the listener
    /// * `reader` - Inbound half of the client stream
    /// * `writer` - Outbound half of the client stream
    /// * `registry` - Handle to the identity registry
    /// * `max_line_length` - Longest accepted line; longer lines end the connection
    pub fn new(
        id: ConnectionId,
        reader: R,
        writer: W,
        registry: RegistryHandle,
        max_line_length: usize,
    ) -> Self {
        Self {
            id,
            reader: FramedRead::new(reader, LinesCodec::new_with_max_length(max_line_length)),
            writer: Some(writer),
            router: MessageRouter::new(registry.clone()),
            presence: PresenceBroadcaster::new(registry.clone()),
            registry,
            idle_timeout: None,
            state: ConnectionState::Connecting,
            session: None,
            writer_task: None,
        }
    }

    /// Closes the connection after `idle` without any inbound line.
    pub fn with_idle_timeout(mut self, idle: Option<Duration>) -> Self {
        self.idle_timeout = idle;
        self
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Runs the connection handler.
    ///
    /// Reads the nickname, then routes lines until the stream ends or
    /// faults. Returns the nickname this connection held, if it registered.
    pub async fn run(mut self) -> Option<Nickname> {
        debug!(connection = %self.id, "New client connected");
        self.state = ConnectionState::AwaitingNickname;

        let nickname = match self.read_line().await {
            Ok(Some(line)) => Nickname::new(line),
            Ok(None) => {
                debug!(connection = %self.id, "Stream ended before nickname");
                self.close().await;
                return None;
            }
            Err(e) => {
                debug!(connection = %self.id, error = %e, "Failed to read nickname");
                self.close().await;
                return None;
            }
        };

        match self.register(nickname.clone()).await {
            Ok(()) => {
                info!(connection = %self.id, nickname = %nickname, "Client joined");
            }
            Err(ConnectionError::Domain(DomainError::NicknameTaken { .. })) => {
                info!(connection = %self.id, nickname = %nickname, "Nickname in use, connection rejected");
                self.close().await;
                return None;
            }
            Err(e) => {
                warn!(connection = %self.id, nickname = %nickname, error = %e, "Registration failed");
                self.close().await;
                return None;
            }
        }

        match self.process_lines().await {
            Ok(()) => debug!(connection = %self.id, "Client closed stream"),
            Err(e) => debug!(connection = %self.id, error = %e, "Connection ended by fault"),
        }

        self.close().await;
        info!(connection = %self.id, nickname = %nickname, "Client disconnected");
        Some(nickname)
    }

    /// Claims `nickname` for this connection.
    ///
    /// On success the welcome line is already queued ahead of anything a
    /// concurrent roster announcement could add, the writer task is running,
    /// and every session has received the new roster. On conflict the
    /// rejection line is written and the outbound half is shut down.
    async fn register(&mut self, nickname: Nickname) -> Result<(), ConnectionError> {
        let Some(writer) = self.writer.take() else {
            return Err(ConnectionError::Closed);
        };

        let (outbound, queue) = outbound_channel();
        let session = Session::new(self.id, nickname.clone(), outbound);
        session.deliver(ServerMessage::welcome(&nickname));

        if !self.registry.try_register(session.clone()).await? {
            self.state = ConnectionState::Rejected;
            reject(writer).await;
            return Err(DomainError::NicknameTaken { nickname }.into());
        }

        self.state = ConnectionState::Registered;
        self.writer_task = Some(tokio::spawn(SessionWriter::new(queue, writer).run()));
        self.session = Some(session);

        self.presence.announce_roster().await;
        Ok(())
    }

    /// Main line processing loop.
    ///
    /// Routes every line until the stream ends (`Ok`), or a read fault,
    /// idle timeout, or write fault occurs (`Err`).
    async fn process_lines(&mut self) -> Result<(), ConnectionError> {
        let Some(session) = self.session.clone() else {
            return Err(ConnectionError::Closed);
        };
        let Some(mut writer_task) = self.writer_task.take() else {
            return Err(ConnectionError::Closed);
        };

        let result = loop {
            tokio::select! {
                line = self.read_line() => {
                    match line {
                        Ok(Some(line)) => {
                            debug!(
                                connection = %self.id,
                                nickname = %session.nickname,
                                message = %line,
                                "Received message"
                            );
                            self.router.route(&session, &line).await;
                        }
                        Ok(None) => break Ok(()),
                        Err(e) => break Err(e),
                    }
                }

                finished = &mut writer_task => {
                    // The writer only stops on its own when a write fails
                    return Err(match finished {
                        Ok(Ok(())) => ConnectionError::Closed,
                        Ok(Err(e)) => ConnectionError::Write(e.to_string()),
                        Err(e) => ConnectionError::Write(e.to_string()),
                    });
                }
            }
        };

        self.writer_task = Some(writer_task);
        result
    }

    /// Tears the connection down.
    ///
    /// For a registered connection, in order: close the outbound handle,
    /// release the nickname, tell the remaining sessions, refresh their
    /// roster. Calling this again, or on a connection that never
    /// registered, only marks it closed.
    pub async fn close(&mut self) {
        self.state = ConnectionState::Closed;

        let Some(session) = self.session.take() else {
            return;
        };

        session.close();
        if let Some(task) = self.writer_task.take() {
            // A writer stuck on a slow peer must not keep the socket open
            task.abort();
        }

        if !self.registry.unregister(&session.nickname).await {
            debug!(connection = %self.id, nickname = %session.nickname, "Nickname was not registered at close");
        }

        self.presence.announce_departure(&session.nickname).await;
        self.presence.announce_roster().await;
    }

    /// Reads a single line from the client.
    ///
    /// `Ok(None)` means the peer closed the stream.
    async fn read_line(&mut self) -> Result<Option<String>, ConnectionError> {
        let next = match self.idle_timeout {
            Some(idle) => timeout(idle, self.reader.next())
                .await
                .map_err(|_| ConnectionError::IdleTimeout)?,
            None => self.reader.next().await,
        };

        match next {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => Err(ConnectionError::LineTooLong {
                max: self.reader.decoder().max_length(),
            }),
            Some(Err(LinesCodecError::Io(e))) => Err(ConnectionError::Io(e.to_string())),
            None => Ok(None),
        }
    }
}

/// Writes the rejection line and shuts the outbound half down.
async fn reject<W>(writer: W)
where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(writer, LinesCodec::new());
    if let Err(e) = sink.send(ServerMessage::NicknameInUse.to_string()).await {
        debug!(error = %e, "Failed to send rejection");
    }
    let _ = SinkExt::<String>::close(&mut sink).await;
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Line too long (max: {max} bytes)")]
    LineTooLong { max: usize },

    #[error("Idle timeout")]
    IdleTimeout,

    #[error("Connection closed")]
    Closed,

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
