//! Per-client session state and its outbound delivery path.
//!
//! Every registered client owns exactly one outbound queue. Any task may push
//! lines into it through a cloned [`Outbound`] handle; a single
//! [`SessionWriter`] task drains the queue into the client's socket, so writes
//! from many routers never interleave on the wire.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Sending to a closed session returns an error instead of panicking

use chrono::{DateTime, Utc};
use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedWrite, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use relay_core::{ConnectionId, DomainError, DomainResult, Nickname};

// ============================================================================
// Outbound Handle
// ============================================================================

/// Returned when a line is pushed into a closed outbound handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("outbound handle closed")]
pub struct OutboundClosed;

/// Creates a connected outbound handle and the queue it feeds.
pub fn outbound_channel() -> (Outbound, OutboundQueue) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let closed = CancellationToken::new();

    let outbound = Outbound {
        sender,
        closed: closed.clone(),
    };
    let queue = OutboundQueue { receiver, closed };

    (outbound, queue)
}

/// Cheap-to-clone handle that delivers lines to one client.
///
/// Safe to use concurrently from any number of tasks.
#[derive(Debug, Clone)]
pub struct Outbound {
    sender: mpsc::UnboundedSender<String>,
    closed: CancellationToken,
}

impl Outbound {
    /// Queues one line (without terminator) for delivery.
    pub fn send(&self, line: impl Into<String>) -> Result<(), OutboundClosed> {
        if self.closed.is_cancelled() {
            return Err(OutboundClosed);
        }
        self.sender.send(line.into()).map_err(|_| OutboundClosed)
    }

    /// Closes the handle. Lines still queued are discarded.
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Returns true once the handle was closed or its writer has gone away.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.sender.is_closed()
    }
}

/// Receiving end of an [`Outbound`] handle.
#[derive(Debug)]
pub struct OutboundQueue {
    receiver: mpsc::UnboundedReceiver<String>,
    closed: CancellationToken,
}

impl OutboundQueue {
    /// Waits for the next queued line.
    ///
    /// Returns `None` once the handle is closed or every sender is dropped.
    pub async fn recv(&mut self) -> Option<String> {
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => None,
            line = self.receiver.recv() => line,
        }
    }

    /// Returns the next queued line without waiting.
    #[cfg(test)]
    pub fn try_recv(&mut self) -> Option<String> {
        if self.closed.is_cancelled() {
            return None;
        }
        self.receiver.try_recv().ok()
    }
}

// ============================================================================
// Session
// ============================================================================

/// One connected client that has claimed a nickname.
///
/// Clones share the same outbound handle.
#[derive(Debug, Clone)]
pub struct Session {
    /// Connection this session was created for
    pub id: ConnectionId,

    /// Nickname claimed at connect time
    pub nickname: Nickname,

    /// When the nickname was claimed
    pub connected_at: DateTime<Utc>,

    /// The only path to this client's socket
    outbound: Outbound,
}

impl Session {
    /// Creates a session for a connection that is about to claim `nickname`.
    pub fn new(id: ConnectionId, nickname: Nickname, outbound: Outbound) -> Self {
        Self {
            id,
            nickname,
            connected_at: Utc::now(),
            outbound,
        }
    }

    /// Queues a line for this client.
    ///
    /// # Errors
    ///
    /// - `DomainError::SessionClosed` if the session was torn down
    pub fn try_deliver(&self, line: impl Into<String>) -> DomainResult<()> {
        self.outbound
            .send(line)
            .map_err(|_| DomainError::SessionClosed {
                nickname: self.nickname.clone(),
            })
    }

    /// Best-effort delivery. Returns whether the line was queued.
    ///
    /// A session may be mid-teardown when a router reaches it; that is not
    /// an error for the caller.
    pub fn deliver(&self, line: impl Into<String>) -> bool {
        match self.try_deliver(line) {
            Ok(()) => true,
            Err(e) => {
                debug!(connection = %self.id, error = %e, "Dropped line for closed session");
                false
            }
        }
    }

    /// Closes the outbound handle. Idempotent.
    pub fn close(&self) {
        self.outbound.close();
    }

    /// Returns true once the session can no longer receive lines.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// Seconds since the nickname was claimed.
    pub fn age_secs(&self) -> i64 {
        (Utc::now() - self.connected_at).num_seconds()
    }
}

// ============================================================================
// Session Writer
// ============================================================================

/// Drains one session's outbound queue into its socket.
///
/// Runs as its own task. Returns when the handle is closed or a write fails;
/// either way the write half is shut down on exit.
pub struct SessionWriter<W> {
    queue: OutboundQueue,
    sink: FramedWrite<W, LinesCodec>,
}

impl<W> SessionWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Creates a writer that feeds `queue` into `writer`, one line per message.
    pub fn new(queue: OutboundQueue, writer: W) -> Self {
        Self {
            queue,
            sink: FramedWrite::new(writer, LinesCodec::new()),
        }
    }

    /// Runs until the handle closes or a write fault occurs.
    pub async fn run(mut self) -> Result<(), LinesCodecError> {
        while let Some(line) = self.queue.recv().await {
            if let Err(e) = self.sink.send(line).await {
                // Stop accepting lines so routers see the session as closed
                self.queue.closed.cancel();
                return Err(e);
            }
        }

        // Flush and shut down the write half; the peer may already be gone
        let _ = SinkExt::<String>::close(&mut self.sink).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncBufReadExt, BufReader};

    fn test_session(nickname: &str) -> (Session, OutboundQueue) {
        let (outbound, queue) = outbound_channel();
        (
            Session::new(ConnectionId::new(1), Nickname::new(nickname), outbound),
            queue,
        )
    }

    #[tokio::test]
    async fn test_deliver_queues_lines_in_order() {
        let (session, mut queue) = test_session("alice");

        assert!(session.deliver("first"));
        assert!(session.deliver(String::from("second")));

        assert_eq!(queue.recv().await.as_deref(), Some("first"));
        assert_eq!(queue.recv().await.as_deref(), Some("second"));
        assert_eq!(queue.try_recv(), None);
    }

    #[tokio::test]
    async fn test_clones_share_outbound() {
        let (session, mut queue) = test_session("alice");
        let clone = session.clone();

        clone.deliver("from clone");
        assert_eq!(queue.recv().await.as_deref(), Some("from clone"));

        session.close();
        assert!(clone.is_closed());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (session, mut queue) = test_session("alice");

        session.close();
        session.close();

        assert!(session.is_closed());
        assert!(!session.deliver("late"));
        assert!(matches!(
            session.try_deliver("late"),
            Err(DomainError::SessionClosed { .. })
        ));
        assert_eq!(queue.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropped_queue_closes_session() {
        let (session, queue) = test_session("alice");
        drop(queue);

        assert!(session.is_closed());
        assert!(!session.deliver("nobody listening"));
    }

    #[tokio::test]
    async fn test_writer_writes_lines() {
        let (session, queue) = test_session("alice");
        let (client, server) = duplex(1024);

        let writer = tokio::spawn(SessionWriter::new(queue, server).run());

        session.deliver("Welcome alice");
        session.deliver("UserList|alice");

        let mut lines = BufReader::new(client).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("Welcome alice"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("UserList|alice"));

        session.close();
        assert!(writer.await.unwrap().is_ok());
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_writer_fault_closes_session() {
        let (session, queue) = test_session("alice");
        let (client, server) = duplex(64);
        drop(client);

        let writer = tokio::spawn(SessionWriter::new(queue, server).run());
        session.deliver("into the void");

        assert!(writer.await.unwrap().is_err());
        assert!(session.is_closed());
    }
}
