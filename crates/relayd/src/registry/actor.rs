//! Registry actor - owns the nickname map and processes commands.
//!
//! The RegistryActor is the single owner of the nickname-to-session mapping.
//! It receives commands via an mpsc channel and answers each on its own
//! oneshot channel.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Response send failures are ignored (the caller gave up waiting)

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info};

use relay_core::Nickname;
use relay_protocol::ServerMessage;

use super::commands::RegistryCommand;
use crate::session::Session;

/// The registry actor - owns all session state.
///
/// # Thread Safety
///
/// The actor runs in a single task and processes commands sequentially.
/// Two `TryRegister` commands for the same nickname are therefore ordered:
/// the first one inserts, the second one sees the entry and is refused.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Live sessions keyed by nickname
    sessions: HashMap<Nickname, Session>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            receiver,
            sessions: HashMap::new(),
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all handles dropped).
    pub async fn run(mut self) {
        info!("Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(sessions = self.sessions.len(), "Registry actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::TryRegister {
                session,
                respond_to,
            } => {
                let result = self.handle_try_register(*session);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::Unregister {
                nickname,
                respond_to,
            } => {
                let result = self.handle_unregister(&nickname);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Lookup {
                nickname,
                respond_to,
            } => {
                let result = self.sessions.get(&nickname).cloned();
                let _ = respond_to.send(result);
            }
            RegistryCommand::Snapshot { respond_to } => {
                let result = self.sessions.keys().cloned().collect();
                let _ = respond_to.send(result);
            }
            RegistryCommand::Sessions { respond_to } => {
                let result = self.sessions.values().cloned().collect();
                let _ = respond_to.send(result);
            }
            RegistryCommand::AnnounceRoster { respond_to } => {
                let result = self.handle_announce_roster();
                let _ = respond_to.send(result);
            }
            RegistryCommand::AnnounceDeparture {
                nickname,
                respond_to,
            } => {
                let result = self.handle_announce_departure(&nickname);
                let _ = respond_to.send(result);
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    /// Inserts the session unless its nickname is already held.
    fn handle_try_register(&mut self, session: Session) -> bool {
        match self.sessions.entry(session.nickname.clone()) {
            Entry::Occupied(existing) => {
                debug!(
                    nickname = %session.nickname,
                    connection = %session.id,
                    holder = %existing.get().id,
                    "Nickname already held, rejecting registration"
                );
                false
            }
            Entry::Vacant(slot) => {
                let connection = session.id;
                let nickname = session.nickname.clone();
                slot.insert(session);

                info!(
                    nickname = %nickname,
                    connection = %connection,
                    total_sessions = self.sessions.len(),
                    "Session registered"
                );
                true
            }
        }
    }

    /// Queues the current roster on every session.
    ///
    /// Delivery only pushes onto unbounded queues, so this never waits on a
    /// client socket.
    fn handle_announce_roster(&self) -> usize {
        let nicknames = self.sessions.keys().cloned().collect();
        let line = ServerMessage::user_list(nicknames).to_string();
        let recipients = self.deliver_all(&line);

        debug!(members = self.sessions.len(), recipients, "Roster announced");
        recipients
    }

    /// Queues a departure notice for `nickname` on every session.
    fn handle_announce_departure(&self, nickname: &Nickname) -> usize {
        let line = ServerMessage::departure(nickname).to_string();
        let recipients = self.deliver_all(&line);

        debug!(nickname = %nickname, recipients, "Departure announced");
        recipients
    }

    fn deliver_all(&self, line: &str) -> usize {
        self.sessions.values().filter(|s| s.deliver(line)).count()
    }

    /// Removes the entry for `nickname` if present.
    fn handle_unregister(&mut self, nickname: &Nickname) -> bool {
        match self.sessions.remove(nickname) {
            Some(session) => {
                info!(
                    nickname = %nickname,
                    connection = %session.id,
                    connected_secs = session.age_secs(),
                    total_sessions = self.sessions.len(),
                    "Session unregistered"
                );
                true
            }
            None => {
                debug!(nickname = %nickname, "Unregister for unknown nickname ignored");
                false
            }
        }
    }
}
