//! Client sessions
//!
//! One [`Session`] per control connection, driven by [`handle_session`].

pub mod handler;
pub mod state;

pub use handler::{SessionContext, handle_session};
pub use state::{AuthState, Session};
