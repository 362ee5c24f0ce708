//! FTP client
//!
//! [`FtpClient`] speaks the protocol; [`Shell`] drives it from a
//! [`CommandSource`] such as stdin or a script.

pub mod connection;
pub mod shell;
pub mod source;

pub use connection::FtpClient;
pub use shell::Shell;
pub use source::{CommandSource, ScriptSource, StdinSource};
