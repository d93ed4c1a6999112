//! Registry actor commands and errors.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//!
//! All types are designed for async message passing and follow the panic-free policy.

use relay_core::Nickname;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::session::Session;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Claim a nickname for a session.
    ///
    /// Responds `true` if the session was inserted, `false` if the
    /// nickname is already held by another session.
    TryRegister {
        /// The session to insert (boxed to reduce enum size variance)
        session: Box<Session>,
        /// Channel to send the result
        respond_to: oneshot::Sender<bool>,
    },

    /// Release a nickname.
    ///
    /// Responds `true` if an entry was removed. Releasing an unknown
    /// nickname is not an error.
    Unregister {
        /// Nickname to release
        nickname: Nickname,
        /// Channel to send the result
        respond_to: oneshot::Sender<bool>,
    },

    /// Look up the session holding a nickname.
    Lookup {
        /// Nickname to look up
        nickname: Nickname,
        /// Channel to send the result
        respond_to: oneshot::Sender<Option<Session>>,
    },

    /// Copy of every registered nickname.
    Snapshot {
        /// Channel to send the results
        respond_to: oneshot::Sender<Vec<Nickname>>,
    },

    /// Copy of every registered session.
    Sessions {
        /// Channel to send the results
        respond_to: oneshot::Sender<Vec<Session>>,
    },

    /// Queue the current roster on every registered session.
    ///
    /// Delivered while the command is handled, so rosters reach each
    /// session in the same order as the membership changes behind them.
    /// Responds with the number of sessions reached.
    AnnounceRoster {
        /// Channel to send the recipient count
        respond_to: oneshot::Sender<usize>,
    },

    /// Queue a departure notice for `nickname` on every registered session.
    ///
    /// Responds with the number of sessions reached.
    AnnounceDeparture {
        /// Nickname that left
        nickname: Nickname,
        /// Channel to send the recipient count
        respond_to: oneshot::Sender<usize>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The actor is gone and can no longer answer.
    ///
    /// This typically indicates the actor was shut down.
    #[error("registry channel closed")]
    ChannelClosed,
}
