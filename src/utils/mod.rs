//! # Utility Modules
//!
//! Supporting utilities for the login protocol.
//!
//! ## Components
//! - **Crypto**: CRC-16 session keys, MD5 digests, login proofs, random tokens
//! - **Password**: GameSpy `passenc` obfuscation codec
//! - **Logging**: Structured logging configuration
//! - **Timeout**: Async deadline wrappers
//! - **Metrics**: Thread-safe observability counters

pub mod crypto;
pub mod logging;
pub mod metrics;
pub mod password;
pub mod timeout;
