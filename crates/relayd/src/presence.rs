//! Presence announcements: roster snapshots and departure notices.
//!
//! The registry actor builds and queues every announcement while handling
//! the request, so each session sees rosters in membership order and the
//! last roster it receives matches the final membership.

use tracing::debug;

use relay_core::Nickname;

use crate::registry::RegistryHandle;

/// Tells every registered session who is online.
#[derive(Clone)]
pub struct PresenceBroadcaster {
    registry: RegistryHandle,
}

impl PresenceBroadcaster {
    /// Creates a broadcaster over the given registry.
    pub fn new(registry: RegistryHandle) -> Self {
        Self { registry }
    }

    /// Sends the current roster to every registered session, including one
    /// that has just joined.
    ///
    /// Returns the number of sessions the roster was queued for.
    pub async fn announce_roster(&self) -> usize {
        let recipients = self.registry.announce_roster().await;
        debug!(recipients, "Roster requested");
        recipients
    }

    /// Tells every remaining session that `nickname` left.
    ///
    /// Call after the nickname is unregistered and follow with
    /// [`announce_roster`](Self::announce_roster).
    pub async fn announce_departure(&self, nickname: &Nickname) -> usize {
        self.registry.announce_departure(nickname).await
    }
}
