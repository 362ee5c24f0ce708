//! Command handlers module.
//!
//! The session state machine: checks each command against the session's
//! authentication state, applies its state change, and writes its reply.
//! Transfer commands (LIST, RETR, STOR) establish a data channel first and
//! send their terminal reply only after the channel is closed.
//!
//! Every error here is answered with a reply; only a failure to write to the
//! control connection is returned to the caller.

use log::{info, warn};
use std::io;
use tokio::io::AsyncWrite;

use crate::error::{
    AuthError, ChannelError, FtpError, ProtocolError, StorageError, error_to_reply,
};
use crate::protocol::address;
use crate::protocol::codec::ControlWriter;
use crate::protocol::commands::Command;
use crate::protocol::responses::{
    ENTERING_PASSIVE, GOODBYE, HELP, LOGIN_SUCCESS, OK, OPENING_DATA, PASSWORD_REQUIRED, Reply,
    TRANSFER_COMPLETE,
};
use crate::session::{AuthState, Session, SessionContext};
use crate::transfer::data_channel::{DataChannel, establish};
use crate::transfer::file_ops::{receive_file, send_file, send_listing};
use crate::transfer::modes::TransferType;
use crate::transfer::results::{TransferOutcome, TransferReport};

/// Whether the control loop keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Continue,
    CloseConnection,
}

const HELP_TOPICS: [(&str, &str); 10] = [
    ("USER", "Specify username to login."),
    ("PASS", "Specify password after USER."),
    ("TYPE", "Set transfer mode (A for ASCII, I for Binary)."),
    ("PORT", "Specify client data port."),
    ("PASV", "Enter passive mode for data transfer."),
    ("LIST", "List directory contents."),
    ("RETR", "Retrieve file from server."),
    ("STOR", "Store file on server."),
    ("HELP", "Show help for a command."),
    ("QUIT", "Close the connection."),
];

/// Dispatches a parsed command and writes its reply (or replies).
pub async fn handle_command<W>(
    session: &mut Session,
    command: Command,
    ctx: &SessionContext,
    replies: &mut ControlWriter<W>,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    if !session.is_logged_in() && !command.allowed_unauthenticated() {
        replies.send_reply(&reject(AuthError::NotLoggedIn)).await?;
        return Ok(CommandStatus::Continue);
    }

    let reply = match command {
        Command::Quit => {
            session.close();
            replies.send_reply(&Reply::new(GOODBYE, "Goodbye.")).await?;
            return Ok(CommandStatus::CloseConnection);
        }
        Command::User(username) => handle_cmd_user(session, &username, ctx),
        Command::Pass(password) => handle_cmd_pass(session, &password, ctx).await,
        Command::Type(arg) => handle_cmd_type(session, &arg),
        Command::Port(arg) => handle_cmd_port(session, &arg),
        Command::Pasv => handle_cmd_pasv(session, ctx).await,
        Command::Help(topic) => handle_cmd_help(topic.as_deref()),
        Command::List => {
            handle_cmd_list(session, ctx, replies).await?;
            return Ok(CommandStatus::Continue);
        }
        Command::Retr(name) => {
            handle_cmd_retr(session, &name, ctx, replies).await?;
            return Ok(CommandStatus::Continue);
        }
        Command::Stor(name) => {
            handle_cmd_stor(session, &name, ctx, replies).await?;
            return Ok(CommandStatus::Continue);
        }
        Command::Unknown(verb) => reject(ProtocolError::NotImplemented(verb)),
    };

    replies.send_reply(&reply).await?;
    Ok(CommandStatus::Continue)
}

fn reject(err: impl Into<FtpError>) -> Reply {
    error_to_reply(&err.into())
}

/// Handles the USER command: a known name moves the session to awaiting-password.
fn handle_cmd_user(session: &mut Session, username: &str, ctx: &SessionContext) -> Reply {
    if username.is_empty() {
        return reject(ProtocolError::MissingArgument("USER"));
    }
    match session.user(username, ctx.credentials.as_ref()) {
        Ok(()) => Reply::new(PASSWORD_REQUIRED, "Username OK, need password."),
        Err(e) => reject(e),
    }
}

/// Handles the PASS command: completes login if it directly follows a valid USER.
async fn handle_cmd_pass(session: &mut Session, password: &str, ctx: &SessionContext) -> Reply {
    if password.is_empty() && matches!(session.auth_state(), AuthState::AwaitingPassword(_)) {
        return reject(ProtocolError::MissingArgument("PASS"));
    }
    let username = match session.pass(password, ctx.credentials.as_ref()) {
        Ok(username) => username.to_string(),
        Err(e) => return reject(e),
    };
    if let Err(e) = ctx.storage.prepare_user(&username).await {
        warn!("Could not prepare storage for {}: {}", username, e);
    }
    Reply::new(LOGIN_SUCCESS, "Login successful.")
}

/// Handles the TYPE command: only A and I are supported.
fn handle_cmd_type(session: &mut Session, arg: &str) -> Reply {
    if arg.trim().is_empty() {
        return reject(ProtocolError::MissingArgument("TYPE"));
    }
    match TransferType::from_arg(arg) {
        Some(transfer_type) => {
            session.set_transfer_type(transfer_type);
            Reply::new(OK, format!("Type set to {}.", transfer_type))
        }
        None => reject(ProtocolError::UnsupportedParameter(arg.to_string())),
    }
}

/// Handles the PORT command: records the client's data address.
///
/// A malformed argument leaves the previous mode untouched.
fn handle_cmd_port(session: &mut Session, arg: &str) -> Reply {
    if arg.trim().is_empty() {
        return reject(ProtocolError::MissingArgument("PORT"));
    }
    match address::decode(arg) {
        Ok(target) => {
            session.set_active(target);
            Reply::new(OK, "Data port set for active mode.")
        }
        Err(e) => {
            warn!("Client {} sent bad PORT {:?}: {}", session.peer(), arg, e);
            reject(e)
        }
    }
}

/// Handles the PASV command: replaces any listener with a fresh one.
async fn handle_cmd_pasv(session: &mut Session, ctx: &SessionContext) -> Reply {
    match session.enter_passive(ctx.config.passive_ports()).await {
        Ok(addr) => Reply::new(
            ENTERING_PASSIVE,
            format!("Entering Passive Mode ({}).", address::encode(addr)),
        ),
        Err(e) => {
            warn!("PASV failed for client {}: {}", session.peer(), e);
            reject(e)
        }
    }
}

fn handle_cmd_help(topic: Option<&str>) -> Reply {
    match topic {
        None => {
            let verbs: Vec<&str> = HELP_TOPICS.iter().map(|(verb, _)| *verb).collect();
            Reply::new(HELP, format!("Supported commands: {}", verbs.join(", ")))
        }
        Some(topic) => HELP_TOPICS
            .iter()
            .find(|(verb, _)| verb.eq_ignore_ascii_case(topic))
            .map(|(verb, text)| Reply::new(HELP, format!("{}: {}", verb, text)))
            .unwrap_or_else(|| {
                reject(ProtocolError::UnsupportedParameter(topic.to_string()))
            }),
    }
}

/// Establishes the data channel for the current mode, once.
async fn open_data_channel(
    session: &Session,
    ctx: &SessionContext,
) -> Result<DataChannel, ChannelError> {
    let request = session.data_request().ok_or(ChannelError::NotConfigured)?;
    establish(request, ctx.config.data_timeout()).await
}

async fn send_opening<W: AsyncWrite + Unpin>(replies: &mut ControlWriter<W>) -> io::Result<()> {
    replies
        .send_reply(&Reply::new(OPENING_DATA, "Opening data connection."))
        .await
}

/// Closes the data channel, then sends the terminal reply.
async fn finish_transfer<W: AsyncWrite + Unpin>(
    session: &Session,
    verb: &str,
    channel: DataChannel,
    report: TransferReport,
    success_text: &str,
    replies: &mut ControlWriter<W>,
) -> io::Result<()> {
    let mut outcome = report.outcome;
    if let Err(e) = channel.close().await {
        // Unsent data means the peer did not get everything.
        if outcome == TransferOutcome::Success && verb != "STOR" {
            warn!("Closing data channel for {} failed: {}", session.peer(), e);
            outcome = TransferOutcome::ConnectionAborted;
        }
    }

    info!(
        "Client {} {} finished: {:?}, {} bytes",
        session.peer(),
        verb,
        outcome,
        report.bytes
    );

    let reply = match outcome {
        TransferOutcome::Success => Reply::new(TRANSFER_COMPLETE, success_text),
        other => other.reply(),
    };
    replies.send_reply(&reply).await
}

fn current_user(session: &Session) -> Result<String, AuthError> {
    session
        .username()
        .map(str::to_string)
        .ok_or(AuthError::NotLoggedIn)
}

/// Handles the LIST command: streams the user's root directory listing.
async fn handle_cmd_list<W: AsyncWrite + Unpin>(
    session: &Session,
    ctx: &SessionContext,
    replies: &mut ControlWriter<W>,
) -> io::Result<()> {
    let user = match current_user(session) {
        Ok(user) => user,
        Err(e) => return replies.send_reply(&reject(e)).await,
    };

    let mut channel = match open_data_channel(session, ctx).await {
        Ok(channel) => channel,
        Err(e) => {
            warn!("LIST for {}: {}", session.peer(), e);
            return replies.send_reply(&reject(e)).await;
        }
    };

    let mut entries = match ctx.storage.list_entries(&user).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("LIST for {}: {}", session.peer(), e);
            drop(channel);
            return replies.send_reply(&reject(e)).await;
        }
    };

    send_opening(replies).await?;
    let report = send_listing(entries.as_mut(), &mut channel).await;
    finish_transfer(session, "LIST", channel, report, "Directory send OK.", replies).await
}

/// Handles the RETR command: the file is resolved before any data channel
/// is opened, so a missing file never consumes one.
async fn handle_cmd_retr<W: AsyncWrite + Unpin>(
    session: &Session,
    name: &str,
    ctx: &SessionContext,
    replies: &mut ControlWriter<W>,
) -> io::Result<()> {
    if name.is_empty() {
        return replies
            .send_reply(&reject(ProtocolError::MissingArgument("RETR")))
            .await;
    }
    let user = match current_user(session) {
        Ok(user) => user,
        Err(e) => return replies.send_reply(&reject(e)).await,
    };

    let source = match ctx.storage.open_for_read(&user, name).await {
        Ok(source) => source,
        Err(e) => {
            info!("RETR {:?} for {}: {}", name, session.peer(), e);
            return replies.send_reply(&reject(e)).await;
        }
    };

    let mut channel = match open_data_channel(session, ctx).await {
        Ok(channel) => channel,
        Err(e) => {
            warn!("RETR for {}: {}", session.peer(), e);
            return replies.send_reply(&reject(e)).await;
        }
    };

    send_opening(replies).await?;
    let report = send_file(
        source,
        &mut channel,
        session.transfer_type(),
        ctx.config.buffer_size,
    )
    .await;
    finish_transfer(session, "RETR", channel, report, "Transfer complete.", replies).await
}

/// Handles the STOR command: writes the data channel's bytes to storage
/// until the client closes it.
async fn handle_cmd_stor<W: AsyncWrite + Unpin>(
    session: &Session,
    name: &str,
    ctx: &SessionContext,
    replies: &mut ControlWriter<W>,
) -> io::Result<()> {
    if name.is_empty() {
        return replies
            .send_reply(&reject(ProtocolError::MissingArgument("STOR")))
            .await;
    }
    let user = match current_user(session) {
        Ok(user) => user,
        Err(e) => return replies.send_reply(&reject(e)).await,
    };

    let mut channel = match open_data_channel(session, ctx).await {
        Ok(channel) => channel,
        Err(e) => {
            warn!("STOR for {}: {}", session.peer(), e);
            return replies.send_reply(&reject(e)).await;
        }
    };

    let sink = match ctx.storage.open_for_write(&user, name).await {
        Ok(sink) => sink,
        Err(e) => {
            warn!("STOR {:?} for {}: {}", name, session.peer(), e);
            drop(channel);
            let e = match e {
                StorageError::Io(io) => StorageError::CreateFailed(name.to_string(), io),
                other => other,
            };
            return replies.send_reply(&reject(e)).await;
        }
    };

    send_opening(replies).await?;
    let report = receive_file(&mut channel, sink, ctx.config.buffer_size).await;
    finish_transfer(session, "STOR", channel, report, "Transfer complete.", replies).await
}
