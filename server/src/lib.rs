//! # TankWars Server Library
//!
//! Authoritative server for a top-down multiplayer tank arena. Clients connect
//! over TCP, send a name, receive their id, the world size and the wall layout,
//! and then stream control commands. Every tick the server advances the world
//! and sends each client one snapshot of every tank, projectile, power-up and
//! beam.
//!
//! ## Architecture
//!
//! ### Single World Task
//! One task owns the [`game::World`]. Connection tasks never touch it; they
//! forward joins, commands and disconnects over a channel. The world task
//! interleaves those messages with ticks, giving ticks priority, so a tick
//! always sees a consistent state and commands are applied between ticks.
//!
//! ### Per-Connection Tasks
//! Each socket gets a reader task that splits the byte stream into newline
//! frames and a writer task that drains a bounded snapshot queue. A client
//! that cannot keep up skips snapshots instead of stalling the tick.
//!
//! ## Module Organization
//!
//! - [`config`]: `settings.json` loading and validation
//! - [`entity`]: tanks, projectiles, power-ups and beams as the server keeps them
//! - [`physics`]: wall boxes, wrap-around and the beam ray test
//! - [`game`]: the world and the fixed-order tick
//! - [`snapshot`]: handshake and per-tick serialization
//! - [`client_manager`]: joined clients and their outbound queues
//! - [`network`]: TCP accept loop, connection tasks and the tick loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerSettings;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ServerSettings::load("settings.json")?;
//!     let server = Server::bind("0.0.0.0:11000", &settings).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod entity;
pub mod game;
pub mod network;
pub mod physics;
pub mod snapshot;
