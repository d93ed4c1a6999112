//! Relay Protocol - Line protocol for chat relay communication
//!
//! This crate provides the grammar of the text lines exchanged between
//! chat clients and the relay: parsing of inbound client lines and
//! rendering of outbound server lines. Every message is exactly one
//! UTF-8 line; framing is left to the transport.

pub mod message;
pub mod parse;

pub use message::ServerMessage;
pub use parse::ClientLine;

/// Prefix that marks a client line as a private-message request.
pub const PRIVATE_MARKER: &str = "PM";

/// Separator between the fields of structured lines.
pub const FIELD_SEPARATOR: char = '|';

/// Port the relay listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 12345;
