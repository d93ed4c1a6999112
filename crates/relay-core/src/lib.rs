//! Relay Core - Shared types for the chat relay
//!
//! This crate provides the domain value types shared between
//! the wire protocol (relay-protocol) and the daemon (relayd).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod identity;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use identity::{ConnectionId, Nickname};
