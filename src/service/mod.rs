//! # Network Services
//!
//! - **Server**: TCP listener running one login exchange per connection
//! - **Client**: Framed login client, used by tools and integration tests

pub mod client;
pub mod server;

pub use client::LoginClient;
pub use server::Server;
