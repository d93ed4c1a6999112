//! Lines sent from the relay to chat clients.

use std::fmt;

use relay_core::Nickname;

use crate::FIELD_SEPARATOR;

/// Sent to a client whose nickname claim lost.
pub const NICKNAME_IN_USE: &str = "Nickname already in use. Try another one.";

/// Messages sent from the relay to clients.
///
/// `Display` renders the exact wire line without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Registration accepted
    Welcome(Nickname),

    /// Registration rejected; the connection closes afterwards
    NicknameInUse,

    /// Full roster of registered nicknames
    UserList(Vec<Nickname>),

    /// Private delivery to a single recipient
    Private {
        /// Nickname the sender embedded in its request
        sender: String,
        /// Message text
        body: String,
    },

    /// A nickname left the chat
    Departure(Nickname),

    /// Broadcast text from another client, relayed unmodified
    Relay(String),
}

impl ServerMessage {
    /// Creates a welcome message.
    pub fn welcome(nickname: &Nickname) -> Self {
        Self::Welcome(nickname.clone())
    }

    /// Creates a roster message.
    pub fn user_list(nicknames: Vec<Nickname>) -> Self {
        Self::UserList(nicknames)
    }

    /// Creates a private relay.
    pub fn private(sender: &str, body: &str) -> Self {
        Self::Private {
            sender: sender.to_string(),
            body: body.to_string(),
        }
    }

    /// Creates a departure notice.
    pub fn departure(nickname: &Nickname) -> Self {
        Self::Departure(nickname.clone())
    }

    /// Creates a broadcast relay.
    pub fn relay(text: &str) -> Self {
        Self::Relay(text.to_string())
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Welcome(nickname) => write!(f, "Welcome {nickname}"),
            Self::NicknameInUse => f.write_str(NICKNAME_IN_USE),
            Self::UserList(nicknames) => {
                write!(f, "UserList{FIELD_SEPARATOR}")?;
                for (i, nickname) in nicknames.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{FIELD_SEPARATOR}")?;
                    }
                    f.write_str(nickname.as_str())?;
                }
                Ok(())
            }
            Self::Private { sender, body } => {
                write!(f, "Private{FIELD_SEPARATOR}{sender}{FIELD_SEPARATOR}{body}")
            }
            Self::Departure(nickname) => write!(f, "{nickname} left the chat"),
            Self::Relay(text) => f.write_str(text),
        }
    }
}

impl From<ServerMessage> for String {
    fn from(msg: ServerMessage) -> Self {
        msg.to_string()
    }
}
