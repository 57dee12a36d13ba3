//! # Dungeon Game Server Library
//!
//! Authoritative server for a small real-time dungeon game. Clients connect
//! over WebSocket, move through a walled room and fight enemies driven by a
//! threat-based AI. The server owns all game state; clients only render what
//! they are told.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every position a client reports is checked against the room walls and
//! slid along them if needed. Damage, threat, rage and enemy behaviour are
//! computed here and nowhere else.
//!
//! ### Connection Lifecycle
//! - WebSocket upgrade on a single configured path
//! - Player creation and the join handshake (own player, others, enemies, room)
//! - Read loop dispatching one message at a time
//! - Cleanup on disconnect, including threat held by enemies
//!
//! ### State Broadcasting
//! Every mutation enqueues its announcement while the state lock is still
//! held, so all clients observe changes in the order they happened. A single
//! fan-out task drains the queue and writes to each socket.
//!
//! ## Architecture Design
//!
//! ### One Lock, Many Tasks
//! All players, enemies and connection handles live in one
//! [`store::EntityStore`] behind a `tokio::sync::RwLock`. Connection
//! handlers, the enemy AI tick and the rage decay tick each take the write
//! lock for one short, non-blocking critical section. No socket write ever
//! happens under that lock.
//!
//! ### Per-Connection Write Lock
//! Each [`client::ClientConnection`] serialises its own socket writes, so a
//! direct reply and a broadcast can never interleave on the wire.
//!
//! ## Module Organization
//!
//! ### Store (`store`)
//! Player and enemy maps keyed by id, plus the connection registry.
//!
//! ### Combat (`combat`)
//! Player attacks, the critical strike ability and target selection.
//!
//! ### Enemy AI (`ai`)
//! Threat upkeep, chasing and enemy attacks at a fixed tick rate, plus the
//! initial enemy cohort.
//!
//! ### Rage Decay (`regen`)
//! Periodic rage loss for warriors.
//!
//! ### Networking (`connection`, `handler`, `broadcast`, `client`)
//! Handshake and read loop, message dispatch, the outbound queue and
//! per-socket writers.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{GameServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = GameServer::new(ServerConfig::default());
//!     let listener = server.bind().await?;
//!
//!     // Fire the trigger from anywhere to stop accepting connections
//!     let trigger = server.shutdown_trigger();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         trigger.fire();
//!     });
//!
//!     server.run(listener).await;
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod broadcast;
pub mod client;
pub mod combat;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod regen;
pub mod server;
pub mod store;

pub use broadcast::Broadcaster;
pub use client::ClientConnection;
pub use config::ServerConfig;
pub use error::GameError;
pub use server::{GameContext, GameServer, ShutdownTrigger};
pub use store::{EntityStore, SharedStore};
