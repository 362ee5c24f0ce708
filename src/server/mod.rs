//! Server core functionality
//!
//! The control listener and the supervision of per-client sessions.

pub mod core;

pub use core::Server;
pub use crate::config::ServerConfig;
