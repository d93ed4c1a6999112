//! Chat relay daemon - nickname registry, routing and presence
//!
//! This crate provides the server side of the chat relay:
//! - `registry` - Identity registry actor mapping nicknames to sessions
//! - `session` - Per-client session and its single-writer outbound queue
//! - `router` - Broadcast and private message routing
//! - `presence` - Roster snapshots and departure notices
//! - `server` - TCP listener and per-connection handlers
//! - `config` - Layered runtime configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         relayd                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   RelayServer   │────▶│     RegistryActor           │   │
//! │  │  (TcpListener)  │     │  (nickname → Session)       │   │
//! │  └────────┬────────┘     └──────────────▲──────────────┘   │
//! │           │                             │                   │
//! │           │ one task per connection     │ lookups           │
//! │           ▼                             │                   │
//! │  ┌─────────────────┐     ┌──────────────┴──────────────┐   │
//! │  │ConnectionHandler│────▶│ MessageRouter /             │   │
//! │  │  (per client)   │     │ PresenceBroadcaster         │   │
//! │  └─────────────────┘     └──────────────┬──────────────┘   │
//! │                                         │ Session queues    │
//! │                                         ▼                   │
//! │                          ┌─────────────────────────────┐   │
//! │                          │ SessionWriter (per client)  │   │
//! │                          └─────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod presence;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
