//! Transfer modes
//!
//! Representation type (TYPE A / TYPE I) and data connection direction (PORT / PASV).

use std::fmt;

/// Representation type selected with TYPE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferType {
    /// Line-oriented; each retrieved line is re-terminated with CRLF.
    #[default]
    Ascii,
    /// Raw bytes.
    Binary,
}

impl TransferType {
    /// Parses a TYPE argument. Only `A` and `I` are supported.
    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg.trim() {
            "A" | "a" => Some(TransferType::Ascii),
            "I" | "i" => Some(TransferType::Binary),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TransferType::Ascii => "A",
            TransferType::Binary => "I",
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferType::Ascii => write!(f, "ASCII"),
            TransferType::Binary => write!(f, "Binary"),
        }
    }
}

/// Which side opens the data connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataMode {
    /// The client listens and the server connects out (PORT).
    #[default]
    Active,
    /// The server listens and the client connects in (PASV).
    Passive,
}
