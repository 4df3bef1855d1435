//! `world_server`
//!
//! Server-side systems:
//! - Authoritative world state gated by monotonically increasing time
//! - Gravity integration and surface-penetration correction
//! - Registry of per-connection snapshot writers
//! - Fixed timestep simulation loop driving update + broadcast
//!
//! Networking model:
//! - One TCP connection per client; unary calls and the subscribed
//!   snapshot stream share it, serialized by a per-connection writer task.

pub mod physics;
pub mod registry;
pub mod server;
pub mod sim;
pub mod world;

pub use server::WorldServer;
