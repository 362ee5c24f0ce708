//! Error types
//!
//! Defines domain-specific error types for each module of the FTP client and server.
//! Every variant that can occur during a session is recoverable: it is translated
//! to a reply code and the session carries on.

use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};

use crate::protocol::responses::{
    ACTION_ABORTED, BAD_ARGUMENTS, BAD_SEQUENCE, CANT_OPEN_DATA, FILE_UNAVAILABLE, NOT_IMPLEMENTED,
    NOT_LOGGED_IN, PARAMETER_NOT_IMPLEMENTED, SYNTAX_ERROR,
};

/// Control-line syntax errors
#[derive(Debug)]
pub enum ProtocolError {
    LineTooLong(usize),
    NonPrintable,
    MissingArgument(&'static str),
    NotImplemented(String),
    UnsupportedParameter(String),
    UnexpectedReply(String),
}

impl ProtocolError {
    pub fn reply_code(&self) -> u16 {
        match self {
            ProtocolError::LineTooLong(_)
            | ProtocolError::NonPrintable
            | ProtocolError::UnexpectedReply(_) => SYNTAX_ERROR,
            ProtocolError::MissingArgument(_) => BAD_ARGUMENTS,
            ProtocolError::NotImplemented(_) => NOT_IMPLEMENTED,
            ProtocolError::UnsupportedParameter(_) => PARAMETER_NOT_IMPLEMENTED,
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::LineTooLong(len) => write!(f, "Command line too long: {} bytes", len),
            ProtocolError::NonPrintable => write!(f, "Command contains non-printable characters"),
            ProtocolError::MissingArgument(verb) => write!(f, "{} requires an argument", verb),
            ProtocolError::NotImplemented(verb) => write!(f, "Command not implemented: {}", verb),
            ProtocolError::UnsupportedParameter(p) => write!(f, "Unsupported parameter: {}", p),
            ProtocolError::UnexpectedReply(r) => write!(f, "Unexpected reply: {}", r),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Authentication errors
#[derive(Debug)]
pub enum AuthError {
    UnknownUser(String),
    InvalidPassword(String),
    NeedUserFirst,
    NotLoggedIn,
}

impl AuthError {
    pub fn reply_code(&self) -> u16 {
        match self {
            AuthError::NeedUserFirst => BAD_SEQUENCE,
            _ => NOT_LOGGED_IN,
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::UnknownUser(u) => write!(f, "Unknown user: {}", u),
            AuthError::InvalidPassword(u) => write!(f, "Invalid password for user: {}", u),
            AuthError::NeedUserFirst => write!(f, "PASS received before USER"),
            AuthError::NotLoggedIn => write!(f, "User not logged in"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Host/port tuple parse errors (PORT arguments and 227 replies)
#[derive(Debug, PartialEq, Eq)]
pub enum AddressError {
    Malformed(String),
    PortOutOfRange(u32),
    NotIpv4(IpAddr),
}

impl AddressError {
    pub fn reply_code(&self) -> u16 {
        BAD_ARGUMENTS
    }
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::Malformed(s) => write!(f, "Malformed address: {}", s),
            AddressError::PortOutOfRange(p) => write!(f, "Port out of range: {}", p),
            AddressError::NotIpv4(ip) => write!(f, "Address is not IPv4: {}", ip),
        }
    }
}

impl std::error::Error for AddressError {}

/// Data channel establishment errors
#[derive(Debug)]
pub enum ChannelError {
    NotConfigured,
    ConnectFailed(SocketAddr, io::Error),
    AcceptFailed(io::Error),
    BindFailed(io::Error),
    NoAvailablePort,
    Timeout(String),
    PeerMismatch { expected: IpAddr, actual: IpAddr },
    Address(AddressError),
}

impl ChannelError {
    pub fn reply_code(&self) -> u16 {
        CANT_OPEN_DATA
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::NotConfigured => write!(f, "No PORT or PASV issued"),
            ChannelError::ConnectFailed(addr, e) => {
                write!(f, "Failed to connect to {}: {}", addr, e)
            }
            ChannelError::AcceptFailed(e) => write!(f, "Failed to accept data connection: {}", e),
            ChannelError::BindFailed(e) => write!(f, "Failed to open data listener: {}", e),
            ChannelError::NoAvailablePort => write!(f, "No available port for data connection"),
            ChannelError::Timeout(what) => write!(f, "Timed out waiting to {}", what),
            ChannelError::PeerMismatch { expected, actual } => write!(
                f,
                "Data connection from {} rejected, expected {}",
                actual, expected
            ),
            ChannelError::Address(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ChannelError {}

impl From<AddressError> for ChannelError {
    fn from(error: AddressError) -> Self {
        ChannelError::Address(error)
    }
}

/// Storage backend errors
#[derive(Debug)]
pub enum StorageError {
    NotFound(String),
    InvalidPath(String),
    CreateFailed(String, io::Error),
    ListFailed(io::Error),
    Io(io::Error),
}

impl StorageError {
    pub fn reply_code(&self) -> u16 {
        match self {
            StorageError::NotFound(_)
            | StorageError::InvalidPath(_)
            | StorageError::CreateFailed(_, _) => FILE_UNAVAILABLE,
            StorageError::ListFailed(_) | StorageError::Io(_) => ACTION_ABORTED,
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(p) => write!(f, "File not found: {}", p),
            StorageError::InvalidPath(p) => write!(f, "Invalid path: {}", p),
            StorageError::CreateFailed(p, e) => write!(f, "Cannot create {}: {}", p, e),
            StorageError::ListFailed(e) => write!(f, "Failed to list directory: {}", e),
            StorageError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(error: io::Error) -> Self {
        StorageError::Io(error)
    }
}

/// General error that encompasses all error types
#[derive(Debug)]
pub enum FtpError {
    Protocol(ProtocolError),
    Auth(AuthError),
    Address(AddressError),
    Channel(ChannelError),
    Storage(StorageError),
    Config(config::ConfigError),
    IoError(io::Error),
    Rejected { code: u16, text: String },
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtpError::Protocol(e) => write!(f, "Protocol error: {}", e),
            FtpError::Auth(e) => write!(f, "Authentication error: {}", e),
            FtpError::Address(e) => write!(f, "Address error: {}", e),
            FtpError::Channel(e) => write!(f, "Data channel error: {}", e),
            FtpError::Storage(e) => write!(f, "Storage error: {}", e),
            FtpError::Config(e) => write!(f, "Configuration error: {}", e),
            FtpError::IoError(e) => write!(f, "I/O error: {}", e),
            FtpError::Rejected { code, text } => write!(f, "Server replied {} {}", code, text),
        }
    }
}

impl std::error::Error for FtpError {}

impl From<ProtocolError> for FtpError {
    fn from(error: ProtocolError) -> Self {
        FtpError::Protocol(error)
    }
}

impl From<AuthError> for FtpError {
    fn from(error: AuthError) -> Self {
        FtpError::Auth(error)
    }
}

impl From<AddressError> for FtpError {
    fn from(error: AddressError) -> Self {
        FtpError::Address(error)
    }
}

impl From<ChannelError> for FtpError {
    fn from(error: ChannelError) -> Self {
        FtpError::Channel(error)
    }
}

impl From<StorageError> for FtpError {
    fn from(error: StorageError) -> Self {
        FtpError::Storage(error)
    }
}

impl From<config::ConfigError> for FtpError {
    fn from(error: config::ConfigError) -> Self {
        FtpError::Config(error)
    }
}

impl From<io::Error> for FtpError {
    fn from(error: io::Error) -> Self {
        FtpError::IoError(error)
    }
}
