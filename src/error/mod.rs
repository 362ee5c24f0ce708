//! Error handling
//!
//! Defines error types and their translation to FTP replies.

pub mod handlers;
pub mod types;

pub use handlers::{error_to_ftp_code, error_to_reply};
pub use types::*;
