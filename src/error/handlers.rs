//! Error handlers
//!
//! Translates recoverable errors into control-channel replies.

use crate::error::types::{AuthError, FtpError, ProtocolError, StorageError};
use crate::protocol::responses::{Reply, SERVICE_UNAVAILABLE};

/// Convert error to FTP response code
pub fn error_to_ftp_code(err: &FtpError) -> u16 {
    match err {
        FtpError::Protocol(e) => e.reply_code(),
        FtpError::Auth(e) => e.reply_code(),
        FtpError::Address(e) => e.reply_code(),
        FtpError::Channel(e) => e.reply_code(),
        FtpError::Storage(e) => e.reply_code(),
        FtpError::Rejected { code, .. } => *code,
        FtpError::Config(_) | FtpError::IoError(_) => SERVICE_UNAVAILABLE,
    }
}

/// Builds the reply sent to the peer for a recoverable error.
///
/// Texts are fixed per code so internal details (paths, OS errors) stay in the log.
pub fn error_to_reply(err: &FtpError) -> Reply {
    let code = error_to_ftp_code(err);
    let text = match err {
        FtpError::Protocol(ProtocolError::MissingArgument(_)) => {
            "Syntax error in parameters or arguments."
        }
        FtpError::Protocol(ProtocolError::UnsupportedParameter(_)) => {
            "Command not implemented for that parameter."
        }
        FtpError::Protocol(ProtocolError::NotImplemented(_)) => "Command not implemented.",
        FtpError::Protocol(_) => "Invalid command syntax.",
        FtpError::Auth(AuthError::NeedUserFirst) => "Login with USER first.",
        FtpError::Auth(AuthError::UnknownUser(_)) => "Invalid username.",
        FtpError::Auth(AuthError::InvalidPassword(_)) => "Invalid password.",
        FtpError::Auth(AuthError::NotLoggedIn) => "Not logged in.",
        FtpError::Address(_) => "Syntax error in parameters or arguments.",
        FtpError::Channel(_) => "Can't open data connection.",
        FtpError::Storage(StorageError::CreateFailed(_, _)) => "Cannot create file.",
        FtpError::Storage(StorageError::InvalidPath(_)) => "Invalid file name.",
        FtpError::Storage(StorageError::NotFound(_)) => "File not found.",
        FtpError::Storage(_) => "Requested action aborted.",
        FtpError::Rejected { text, .. } => text.as_str(),
        FtpError::Config(_) | FtpError::IoError(_) => "Service not available.",
    };
    Reply::new(code, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;

    #[test]
    fn auth_errors_map_to_login_codes() {
        assert_eq!(error_to_reply(&AuthError::NeedUserFirst.into()).code(), 503);
        assert_eq!(error_to_reply(&AuthError::NotLoggedIn.into()).code(), 530);
        assert_eq!(
            error_to_reply(&AuthError::UnknownUser("mallory".into()).into()).code(),
            530
        );
    }

    #[test]
    fn storage_errors_split_between_550_and_451() {
        let missing: FtpError = StorageError::NotFound("a.txt".into()).into();
        assert_eq!(error_to_reply(&missing).code(), 550);

        let listing: FtpError =
            StorageError::ListFailed(std::io::Error::from(std::io::ErrorKind::NotFound)).into();
        assert_eq!(error_to_reply(&listing).code(), 451);
    }

    #[test]
    fn channel_errors_are_425() {
        let reply = error_to_reply(&ChannelError::NotConfigured.into());
        assert_eq!(reply.to_string(), "425 Can't open data connection.");
    }
}
