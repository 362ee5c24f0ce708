use log::{debug, error, info, warn};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::auth::{CredentialStore, CredentialVerifier};
use crate::config::ServerConfig;
use crate::error::FtpError;
use crate::session::{SessionContext, handle_session};
use crate::storage::{FsStorage, StorageBackend};

pub struct Server {
    listener: TcpListener,
    ctx: Arc<SessionContext>,
}

impl Server {
    /// Binds the control listener with explicit collaborators.
    pub async fn bind(
        config: ServerConfig,
        credentials: Arc<dyn CredentialVerifier>,
        storage: Arc<dyn StorageBackend>,
    ) -> Result<Self, FtpError> {
        let root = config.storage_root_path();
        if let Err(e) = tokio::fs::create_dir_all(&root).await {
            warn!("Failed to create storage root {}: {}", root.display(), e);
        } else {
            info!("Storage root: {}", root.display());
        }

        let socket = config.control_socket();
        let listener = TcpListener::bind(&socket).await.map_err(|e| {
            error!("Failed to bind to {}: {}", socket, e);
            e
        })?;
        info!("Server bound to {}", listener.local_addr()?);

        Ok(Self {
            listener,
            ctx: Arc::new(SessionContext {
                config: Arc::new(config),
                credentials,
                storage,
            }),
        })
    }

    /// Binds using the credentials file and storage root named in `config`.
    pub async fn from_config(config: ServerConfig) -> Result<Self, FtpError> {
        let credentials_path = config.credentials_path();
        let credentials = CredentialStore::load(&credentials_path).map_err(|e| {
            error!(
                "Failed to load credentials from {}: {}",
                credentials_path.display(),
                e
            );
            e
        })?;
        info!("Loaded {} user(s)", credentials.len());

        let storage = FsStorage::new(config.storage_root_path(), config.create_user_roots);
        Self::bind(config, Arc::new(credentials), Arc::new(storage)).await
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until the process is killed.
    pub async fn run(self) {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Accepts control connections until `shutdown` resolves, then aborts
    /// every live session and waits for them to finish.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down, closing {} session(s)", sessions.len());
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("Accepted control connection from {}", addr);
                        let ctx = Arc::clone(&self.ctx);
                        sessions.spawn(async move {
                            if let Err(e) = handle_session(stream, ctx).await {
                                warn!("Failed to handle client {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                },
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = finished {
                        if e.is_panic() {
                            error!("Session task panicked: {}", e);
                        }
                    }
                }
            }
        }

        sessions.abort_all();
        while sessions.join_next().await.is_some() {}
        info!("Server stopped");
    }
}
