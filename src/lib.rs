pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod storage;
pub mod transfer;

pub use client::FtpClient;
pub use config::{ClientConfig, ServerConfig};
pub use error::FtpError;
pub use server::Server;
