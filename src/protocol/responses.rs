//! FTP Response handling
//!
//! Defines FTP response codes, the `Reply` value, and reply formatting/parsing.

use std::fmt;

use crate::error::ProtocolError;

/// Standard FTP response codes
pub const OPENING_DATA: u16 = 150;
pub const OK: u16 = 200;
pub const HELP: u16 = 214;
pub const READY: u16 = 220;
pub const GOODBYE: u16 = 221;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const ENTERING_PASSIVE: u16 = 227;
pub const LOGIN_SUCCESS: u16 = 230;
pub const PASSWORD_REQUIRED: u16 = 331;
pub const SERVICE_UNAVAILABLE: u16 = 421;
pub const CANT_OPEN_DATA: u16 = 425;
pub const TRANSFER_ABORTED: u16 = 426;
pub const ACTION_ABORTED: u16 = 451;
pub const SYNTAX_ERROR: u16 = 500;
pub const BAD_ARGUMENTS: u16 = 501;
pub const NOT_IMPLEMENTED: u16 = 502;
pub const BAD_SEQUENCE: u16 = 503;
pub const PARAMETER_NOT_IMPLEMENTED: u16 = 504;
pub const NOT_LOGGED_IN: u16 = 530;
pub const FILE_UNAVAILABLE: u16 = 550;

/// A single control-channel reply: a three-digit code and its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    code: u16,
    text: String,
}

impl Reply {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// CRLF-terminated wire form.
    pub fn to_wire(&self) -> String {
        format_response(self.code, &self.text)
    }

    /// Parses the first line of a reply.
    ///
    /// Returns the reply and whether it is the first line of a multi-line
    /// reply (`ddd-text`), in which case lines follow until `ddd text`.
    pub fn parse_line(line: &str) -> Result<(Self, bool), ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let bytes = line.as_bytes();
        if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
            return Err(ProtocolError::UnexpectedReply(line.to_string()));
        }
        let code: u16 = line[..3]
            .parse()
            .map_err(|_| ProtocolError::UnexpectedReply(line.to_string()))?;
        let (multiline, text) = match bytes.get(3) {
            Some(b'-') => (true, &line[4..]),
            Some(b' ') => (false, &line[4..]),
            None => (false, ""),
            Some(_) => return Err(ProtocolError::UnexpectedReply(line.to_string())),
        };
        Ok((Self::new(code, text), multiline))
    }

    /// True when `line` terminates a multi-line reply started with `code`.
    pub fn ends_multiline(code: u16, line: &str) -> bool {
        let prefix = format!("{} ", code);
        line.starts_with(&prefix) || line.trim_end_matches(['\r', '\n']) == code.to_string()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}

/// Format an FTP response message
pub fn format_response(code: u16, message: &str) -> String {
    format!("{} {}\r\n", code, message)
}
