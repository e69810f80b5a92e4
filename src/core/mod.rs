//! # Core Protocol Components
//!
//! Packet model, typed binding and stream framing for the GameSpy wire format.
//!
//! ## Components
//! - **Packet**: Ordered key/value list with duplicate keys
//! - **Bind**: Projection of packets onto typed records
//! - **Codec**: Tokio codec for framing over byte streams
//!
//! ## Wire Format
//! ```text
//! \key1\value1\key2\value2\...\final\
//! ```
//!
//! Values may be empty. There is no escape sequence for `\`.

pub mod bind;
pub mod codec;
pub mod packet;
