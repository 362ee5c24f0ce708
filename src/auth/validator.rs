//! Authentication validator
//!
//! Drives the USER/PASS exchange against a [`CredentialVerifier`].

use log::{info, warn};

use crate::auth::credentials::CredentialVerifier;
use crate::error::AuthError;

/// Basic sanitation for usernames and passwords.
pub fn is_valid_input(input: &str) -> bool {
    !input.trim().is_empty() && !input.contains(['\r', '\n', '\0', '/', '\\'])
}

/// Validates that the given username exists.
pub fn validate_user(username: &str, verifier: &dyn CredentialVerifier) -> Result<(), AuthError> {
    if is_valid_input(username) && verifier.user_exists(username) {
        Ok(())
    } else {
        warn!("Rejected unknown user {:?}", username);
        Err(AuthError::UnknownUser(username.to_string()))
    }
}

/// Validates that the password matches the stored password for the username.
pub fn validate_password(
    username: &str,
    password: &str,
    verifier: &dyn CredentialVerifier,
) -> Result<(), AuthError> {
    if verifier.verify(username, password) {
        info!("User {} authenticated", username);
        Ok(())
    } else {
        warn!("Invalid password for user {}", username);
        Err(AuthError::InvalidPassword(username.to_string()))
    }
}
