//! FTP Protocol implementation
//!
//! Control-channel framing, command parsing, reply formatting, address
//! encoding for PORT/PASV, and the per-command session handlers.

pub mod address;
pub mod codec;
pub mod commands;
pub mod handlers;
pub mod responses;

pub use codec::{ControlReader, ControlWriter};
pub use commands::{Command, parse_command};
pub use handlers::{CommandStatus, handle_command};
pub use responses::Reply;
