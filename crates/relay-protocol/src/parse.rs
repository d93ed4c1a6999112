//! Parsing of lines sent by chat clients.
//!
//! The first line of a connection is always the nickname and is not parsed
//! here. Every later line is either a private-message request or broadcast text.

use crate::{FIELD_SEPARATOR, PRIVATE_MARKER};

/// Number of fields in a well-formed private request: marker, target, sender, body.
const PRIVATE_FIELDS: usize = 4;

/// A line received from a registered client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientLine<'a> {
    /// Text relayed verbatim to every other session.
    ///
    /// The client embeds its own nickname in the text; the relay never
    /// re-formats it.
    Broadcast(&'a str),

    /// Request to deliver `body` to `target` only.
    Private {
        /// Nickname of the intended recipient
        target: &'a str,
        /// Nickname the client claims to be sending as
        sender: &'a str,
        /// Message text, may itself contain separators
        body: &'a str,
    },

    /// Line carried the private marker but too few fields.
    ///
    /// The protocol has no error reply, so callers drop these silently.
    MalformedPrivate,
}

impl<'a> ClientLine<'a> {
    /// Classifies a raw line (without its line terminator).
    ///
    /// Any line starting with `PM` is a private request, even when the
    /// marker is not followed directly by a separator. Splitting stops after
    /// the third separator so the body keeps any further `|` characters.
    pub fn parse(line: &'a str) -> Self {
        if !line.starts_with(PRIVATE_MARKER) {
            return Self::Broadcast(line);
        }

        let mut fields = line.splitn(PRIVATE_FIELDS, FIELD_SEPARATOR);
        let _marker = fields.next();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(target), Some(sender), Some(body)) => Self::Private {
                target,
                sender,
                body,
            },
            _ => Self::MalformedPrivate,
        }
    }
}
