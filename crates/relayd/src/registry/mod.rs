//! Identity registry using Actor pattern.
//!
//! The registry is the only shared mutable state of the relay: the mapping
//! from nickname to live session. It receives commands via a tokio mpsc
//! channel and is the canonical source of truth for who is online.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────────┐
//! │ConnectionHandler │────▶│  RegistryActor  │
//! │ MessageRouter    │     │                 │
//! │ PresenceBroadcast│     │ HashMap<Nickname│
//! └──────────────────┘     │   , Session>    │
//!         │                └─────────────────┘
//!         │   RegistryCommand (mpsc)   ▲
//!         └──── oneshot response ──────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::mpsc;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{RegistryCommand, RegistryError};
pub use handle::RegistryHandle;

/// Command channel buffer size
const COMMAND_BUFFER: usize = 256;

/// Spawn the registry actor and return a handle for interaction.
///
/// Construct this once at startup and pass clones of the handle to every
/// connection task.
///
/// # Example
///
/// ```no_run
/// use relayd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry();
///
///     // Use handle to interact with registry
///     let nicknames = handle.snapshot().await;
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

    let actor = RegistryActor::new(cmd_rx);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx)
}
