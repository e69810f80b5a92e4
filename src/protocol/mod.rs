//! # Login Protocol
//!
//! Request model, identity registry and the server handshake.
//!
//! ## Components
//! - **Login**: Typed login request with field validation, plus reply models
//! - **Registry**: Concurrent player id assignment
//! - **Handshake**: Per-connection state machine and reply builders

pub mod handshake;
pub mod login;
pub mod registry;

#[cfg(test)]
mod tests;
