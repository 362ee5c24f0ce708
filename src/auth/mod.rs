//! Authentication system
//!
//! Credential lookup and USER/PASS validation.

pub mod credentials;
pub mod validator;

pub use credentials::{CredentialStore, CredentialVerifier};
pub use validator::{validate_password, validate_user};
