//! Routing of lines received from registered clients.
//!
//! A line is either broadcast verbatim to every other session or, when it
//! carries the private marker, relayed to a single target. Malformed private
//! requests and requests for unknown targets are dropped without telling the
//! sender: the protocol has no reply for either case and there is no
//! delivery confirmation of any kind.

use tracing::debug;

use relay_core::Nickname;
use relay_protocol::{ClientLine, ServerMessage};

use crate::registry::RegistryHandle;
use crate::session::Session;

/// What happened to a routed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Relayed to this many other sessions
    Broadcast {
        /// Sessions the line was queued for
        recipients: usize,
    },

    /// Private relay queued for its target
    Private,

    /// Line was discarded (malformed request or unknown target)
    Dropped,
}

/// Decides where each inbound line goes and queues it there.
#[derive(Clone)]
pub struct MessageRouter {
    registry: RegistryHandle,
}

impl MessageRouter {
    /// Creates a router over the given registry.
    pub fn new(registry: RegistryHandle) -> Self {
        Self { registry }
    }

    /// Routes one line sent by `sender`.
    ///
    /// Nothing is ever sent back to `sender` by the router itself.
    pub async fn route(&self, sender: &Session, line: &str) -> RouteOutcome {
        match ClientLine::parse(line) {
            ClientLine::Broadcast(text) => self.broadcast(sender, text).await,
            ClientLine::Private {
                target,
                sender: claimed_sender,
                body,
            } => {
                debug!(
                    connection = %sender.id,
                    recipient = %target,
                    claimed_sender = %claimed_sender,
                    "Handling private message"
                );
                self.deliver_private(target, claimed_sender, body).await
            }
            ClientLine::MalformedPrivate => {
                debug!(
                    connection = %sender.id,
                    nickname = %sender.nickname,
                    "Dropping private message with too few fields"
                );
                RouteOutcome::Dropped
            }
        }
    }

    /// Relays `text` to every session except the sender's nickname.
    async fn broadcast(&self, sender: &Session, text: &str) -> RouteOutcome {
        let line = ServerMessage::relay(text).to_string();
        let mut recipients = 0;

        for session in self.registry.sessions().await {
            if session.nickname == sender.nickname {
                continue;
            }
            if session.deliver(line.as_str()) {
                recipients += 1;
            }
        }

        debug!(
            connection = %sender.id,
            nickname = %sender.nickname,
            recipients,
            "Broadcast relayed"
        );
        RouteOutcome::Broadcast { recipients }
    }

    /// Queues a private relay for `target`, if it is registered.
    async fn deliver_private(&self, target: &str, sender: &str, body: &str) -> RouteOutcome {
        let Some(session) = self.registry.lookup(&Nickname::new(target)).await else {
            debug!(recipient = %target, "Private message target not registered, dropping");
            return RouteOutcome::Dropped;
        };

        if session.deliver(ServerMessage::private(sender, body)) {
            RouteOutcome::Private
        } else {
            RouteOutcome::Dropped
        }
    }
}
