//! Module `state`
//!
//! Per-connection session state: authentication progress, transfer type and
//! data endpoint. A `Session` is owned by the task serving its control
//! connection and is never shared, so none of this state needs locking.

use log::info;
use std::net::{IpAddr, SocketAddr, SocketAddrV4};

use crate::auth::{CredentialVerifier, validate_password, validate_user};
use crate::error::{AuthError, ChannelError};
use crate::protocol::address;
use crate::transfer::data_channel::{DataChannelRequest, DataEndpoint, PassiveListener, PortRange};
use crate::transfer::modes::{DataMode, TransferType};

/// USER/PASS progress.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    AwaitingPassword(String),
    Authenticated(String),
}

pub struct Session {
    peer: SocketAddr,
    local: SocketAddr,
    auth: AuthState,
    transfer_type: TransferType,
    data: DataEndpoint,
}

impl Session {
    /// `peer` is the client end of the control connection, `local` our end.
    pub fn new(peer: SocketAddr, local: SocketAddr) -> Self {
        Self {
            peer,
            local,
            auth: AuthState::default(),
            transfer_type: TransferType::default(),
            data: DataEndpoint::default(),
        }
    }

    // --------------------
    // Getter methods
    // --------------------

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn auth_state(&self) -> &AuthState {
        &self.auth
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.auth, AuthState::Authenticated(_))
    }

    /// The authenticated user, if logged in.
    pub fn username(&self) -> Option<&str> {
        match &self.auth {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn transfer_type(&self) -> TransferType {
        self.transfer_type
    }

    pub fn mode(&self) -> DataMode {
        self.data.mode()
    }

    /// Address of the open passive listener, if any.
    pub fn passive_addr(&self) -> Option<SocketAddrV4> {
        self.data.listener().map(PassiveListener::local_addr)
    }

    // --------------------
    // Transitions
    // --------------------

    /// USER: a known name moves to `AwaitingPassword`, anything else back to
    /// `Unauthenticated`. Either way a previous login is discarded.
    pub fn user(&mut self, username: &str, verifier: &dyn CredentialVerifier) -> Result<(), AuthError> {
        match validate_user(username, verifier) {
            Ok(()) => {
                self.auth = AuthState::AwaitingPassword(username.to_string());
                Ok(())
            }
            Err(e) => {
                self.auth = AuthState::Unauthenticated;
                Err(e)
            }
        }
    }

    /// PASS: only valid directly after a successful USER. A wrong password
    /// drops back to `Unauthenticated`, so the next attempt starts with USER.
    pub fn pass(&mut self, password: &str, verifier: &dyn CredentialVerifier) -> Result<&str, AuthError> {
        let username = match &self.auth {
            AuthState::AwaitingPassword(username) => username.clone(),
            _ => return Err(AuthError::NeedUserFirst),
        };
        match validate_password(&username, password, verifier) {
            Ok(()) => {
                info!("Client {} logged in as {}", self.peer, username);
                self.auth = AuthState::Authenticated(username);
                Ok(self.username().unwrap_or_default())
            }
            Err(e) => {
                self.auth = AuthState::Unauthenticated;
                Err(e)
            }
        }
    }

    pub fn set_transfer_type(&mut self, transfer_type: TransferType) {
        self.transfer_type = transfer_type;
    }

    /// PORT: switch to active mode. Any open passive listener is closed.
    pub fn set_active(&mut self, target: SocketAddrV4) {
        if let Some(old) = self.passive_addr() {
            info!("Client {} left passive mode, closing listener {}", self.peer, old);
        }
        self.data = DataEndpoint::Active(target);
        info!("Client {} data target set to {} (active)", self.peer, target);
    }

    /// PASV: close any previous listener, then open a fresh one on the
    /// address the client reached us on.
    pub async fn enter_passive(&mut self, ports: PortRange) -> Result<SocketAddrV4, ChannelError> {
        if let Some(old) = self.passive_addr() {
            info!("Client {} reissued PASV, closing listener {}", self.peer, old);
        }
        self.data = DataEndpoint::Unset;

        let local_ip = *address::to_v4(self.local)?.ip();
        let listener = PassiveListener::bind(local_ip, ports).await?;
        let addr = listener.local_addr();
        self.data = DataEndpoint::Passive(listener);
        info!("Client {} data listener open on {} (passive)", self.peer, addr);
        Ok(addr)
    }

    /// The data connection the next transfer needs, if PORT or PASV was issued.
    pub fn data_request(&self) -> Option<DataChannelRequest<'_>> {
        self.data.request(Some(self.peer_ip()))
    }

    fn peer_ip(&self) -> IpAddr {
        self.peer.ip()
    }

    /// Releases everything the session holds.
    pub fn close(&mut self) {
        if let Some(addr) = self.passive_addr() {
            info!("Closing data listener {} for client {}", addr, self.peer);
        }
        self.data = DataEndpoint::Unset;
        self.auth = AuthState::Unauthenticated;
    }
}
