use log::{debug, info, warn};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::TcpStream;

use crate::auth::CredentialVerifier;
use crate::config::ServerConfig;
use crate::error::{FtpError, error_to_reply};
use crate::protocol::codec::{ControlReader, ControlWriter};
use crate::protocol::commands::{parse_command, redact};
use crate::protocol::handlers::{CommandStatus, handle_command};
use crate::protocol::responses::{READY, Reply};
use crate::session::state::Session;
use crate::storage::StorageBackend;

/// Everything a session needs that outlives it and is shared across sessions.
pub struct SessionContext {
    pub config: Arc<ServerConfig>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub storage: Arc<dyn StorageBackend>,
}

/// Serves one control connection until QUIT or disconnect.
///
/// - Greets with 220.
/// - Reads command lines through a [`ControlReader`], answering framing
///   errors with 500 without closing the connection.
/// - Dispatches each command with [`handle_command`].
///
/// The session's data listener, if any, is released on every exit path.
pub async fn handle_session(stream: TcpStream, ctx: Arc<SessionContext>) -> Result<(), FtpError> {
    let peer = stream.peer_addr()?;
    let local = stream.local_addr()?;
    let (read_half, write_half) = stream.into_split();
    let mut reader =
        ControlReader::with_limit(BufReader::new(read_half), ctx.config.max_command_length);
    let mut replies = ControlWriter::new(write_half);
    let mut session = Session::new(peer, local);

    info!("Client {} connected", peer);
    replies
        .send_reply(&Reply::new(READY, "Service ready for new user."))
        .await?;

    let result = serve(&mut session, &mut reader, &mut replies, &ctx).await;
    session.close();

    match &result {
        Ok(()) => info!("Client {} disconnected", peer),
        Err(e) => warn!("Session with {} ended: {}", peer, e),
    }
    result
}

async fn serve<R, W>(
    session: &mut Session,
    reader: &mut ControlReader<R>,
    replies: &mut ControlWriter<W>,
    ctx: &SessionContext,
) -> Result<(), FtpError>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(line) = reader.next_line().await? {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                debug!("Rejected line from {}: {}", session.peer(), e);
                replies.send_reply(&error_to_reply(&e.into())).await?;
                continue;
            }
        };

        info!("Received from {}: {}", session.peer(), redact(&line));
        let command = parse_command(&line);
        if handle_command(session, command, ctx, replies).await? == CommandStatus::CloseConnection {
            replies.shutdown().await?;
            return Ok(());
        }
    }
    Ok(())
}
