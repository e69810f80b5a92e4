//! # GameSpy Login
//!
//! Emulation of the legacy GameSpy login handshake: the server sends a
//! challenge, receives a login request in the `\key\value\...\final\` wire
//! format, validates it, assigns a player id and answers with a proof.
//!
//! ## Layout
//! - [`core`]: packet model, binding and stream codec
//! - [`protocol`]: login request, player registry, handshake
//! - [`service`]: TCP server and client
//! - [`utils`]: crypto primitives, password codec, logging, metrics, timeouts
//! - [`config`]: TOML and environment configuration
//! - [`error`]: crate error type

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod utils;

pub use crate::core::packet::{KeyValuePair, Packet};
pub use crate::error::{ProtocolError, Result};
