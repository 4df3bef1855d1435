//! `world_client`
//!
//! Client-side systems:
//! - Connection management over one framed TCP stream
//! - Unary calls: create character, movement report, ping, death report
//! - Snapshot stream subscription with last-snapshot tracking
//!
//! Rendering, input, and audio live elsewhere; this crate is the headless
//! protocol client used by tools and tests.

pub mod client;

pub use client::WorldClient;
