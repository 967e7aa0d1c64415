//! # Snake Arena Server
//!
//! The authoritative half of the game. The server owns the only real copy
//! of the arena: every snake, every food pellet and the rules that connect
//! them. Clients send steering input and receive quantized snapshots.
//!
//! ## Architecture
//!
//! ### Single writer
//! One task owns the [`world::World`] and the [`session::SessionManager`].
//! Incoming datagrams are decoded on a receiver task and forwarded over a
//! channel; joins, inputs and leaves are applied between ticks in arrival
//! order, so no locking is needed around game state.
//!
//! ### Fixed tick
//! The world advances at 30 Hz. Each tick moves every snake, resolves
//! feeding and collisions, then broadcasts one snapshot carrying the full
//! player list and only the food that changed. A snapshot too large for one
//! datagram goes out in several parts sharing the tick number.
//!
//! ### Lossy delivery
//! Outbound datagrams go through a bounded queue. A slow socket loses
//! snapshots instead of buffering them; clients interpolate across gaps.
//!
//! ## Modules
//!
//! - `player`, `food`, `collision`: the simulation pieces
//! - `world`: the tick pipeline tying them together
//! - `codec`: quantized wire views of world state
//! - `session`: address to player bookkeeping
//! - `network`: UDP transport and the main loop
//! - `config`: tunables with defaults
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), server::network::BoxError> {
//!     let mut server = Server::new("0.0.0.0:3000", ServerConfig::default()).await?;
//!     server.run().await
//! }
//! ```

pub mod codec;
pub mod collision;
pub mod config;
pub mod food;
pub mod network;
pub mod player;
pub mod session;
pub mod world;
