//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RegistryError::ChannelClosed` or an empty result

use tokio::sync::{mpsc, oneshot};

use relay_core::Nickname;

use super::commands::{RegistryCommand, RegistryError};
use crate::session::Session;

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// Callers never lock anything; the actor serializes access internally.
///
/// # Usage
///
/// ```ignore
/// let handle = registry_handle.clone();
///
/// if handle.try_register(session).await? {
///     let roster = handle.snapshot().await;
/// }
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    pub fn new(sender: mpsc::Sender<RegistryCommand>) -> Self {
        Self { sender }
    }

    /// Atomically claim the session's nickname.
    ///
    /// Returns `Ok(true)` if the session was inserted and `Ok(false)` if
    /// another session already holds the nickname. Of any number of
    /// concurrent claims on one nickname, exactly one sees `true`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn try_register(&self, session: Session) -> Result<bool, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::TryRegister {
                session: Box::new(session),
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Release a nickname.
    ///
    /// Returns whether an entry was removed. Releasing a nickname that is
    /// not registered, or releasing it twice, is a no-op. Also returns
    /// `false` if the actor has shut down.
    pub async fn unregister(&self, nickname: &Nickname) -> bool {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Unregister {
                nickname: nickname.clone(),
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return false;
        }

        rx.await.unwrap_or(false)
    }

    /// Get the session currently holding a nickname.
    ///
    /// The result may be stale as soon as it is returned; delivery to it
    /// is best-effort. Returns `None` if the actor has shut down.
    pub async fn lookup(&self, nickname: &Nickname) -> Option<Session> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Lookup {
                nickname: nickname.clone(),
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Copy of all registered nicknames, in no particular order.
    ///
    /// Returns an empty vector if the actor has shut down.
    pub async fn snapshot(&self) -> Vec<Nickname> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Copy of all registered sessions, in no particular order.
    ///
    /// Returns an empty vector if the actor has shut down.
    pub async fn sessions(&self) -> Vec<Session> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Sessions { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Queue the current roster on every registered session.
    ///
    /// The actor builds and delivers the line while handling the command, so
    /// concurrent announcements can never reach a session out of order.
    /// Returns the number of sessions reached, or 0 if the actor is gone.
    pub async fn announce_roster(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::AnnounceRoster { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or(0)
    }

    /// Queue a departure notice for `nickname` on every registered session.
    ///
    /// Returns the number of sessions reached, or 0 if the actor is gone.
    pub async fn announce_departure(&self, nickname: &Nickname) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::AnnounceDeparture {
                nickname: nickname.clone(),
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or(0)
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.snapshot().await.len()
    }

    /// Returns true if no session is registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::outbound_channel;
    use relay_core::ConnectionId;

    fn test_session(nickname: &str) -> Session {
        let (outbound, _queue) = outbound_channel();
        Session::new(ConnectionId::new(0), Nickname::new(nickname), outbound)
    }

    #[tokio::test]
    async fn test_handle_after_actor_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = RegistryHandle::new(tx);

        assert_eq!(
            handle.try_register(test_session("alice")).await,
            Err(RegistryError::ChannelClosed)
        );
        assert!(!handle.unregister(&Nickname::new("alice")).await);
        assert!(handle.lookup(&Nickname::new("alice")).await.is_none());
        assert!(handle.snapshot().await.is_empty());
        assert!(handle.sessions().await.is_empty());
        assert_eq!(handle.announce_roster().await, 0);
        assert_eq!(handle.announce_departure(&Nickname::new("alice")).await, 0);
    }
}
