//! Domain-specific error types following panic-free policy.

use crate::Nickname;
use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Another live session already holds this nickname
    #[error("Nickname already in use: {nickname}")]
    NicknameTaken { nickname: Nickname },

    /// The session's outbound handle has been closed
    #[error("Session closed: {nickname}")]
    SessionClosed { nickname: Nickname },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
