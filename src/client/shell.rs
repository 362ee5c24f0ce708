//! Line-oriented front end for [`FtpClient`].
//!
//! Each input line is one FTP command. Login commands, HELP and QUIT go to
//! the server as typed; PORT and PASV only pick the data mode for later
//! transfers; RETR and STOR read and write files under the local directory.

use log::warn;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::client::connection::FtpClient;
use crate::client::source::CommandSource;
use crate::error::FtpError;
use crate::protocol::commands::{Command, parse_command};
use crate::protocol::responses::{LOGIN_SUCCESS, Reply};
use crate::storage::sanitize_filename;
use crate::transfer::modes::TransferType;

enum Step {
    Continue,
    Quit,
}

pub struct Shell<W> {
    local_dir: PathBuf,
    out: W,
    logged_in: bool,
}

impl<W: AsyncWrite + Unpin> Shell<W> {
    pub fn new(local_dir: impl Into<PathBuf>, out: W) -> Self {
        Self {
            local_dir: local_dir.into(),
            out,
            logged_in: false,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs commands from `source` until QUIT, end of input, or loss of
    /// the control connection.
    pub async fn run<S>(&mut self, mut client: FtpClient, source: &mut S) -> Result<(), FtpError>
    where
        S: CommandSource + ?Sized,
    {
        while let Some(line) = source.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match self.execute(&mut client, line).await {
                Ok(Step::Continue) => {}
                Ok(Step::Quit) => {
                    let reply = client.quit().await?;
                    self.print_reply(&reply).await?;
                    return Ok(());
                }
                Err(e) if is_fatal(&e) => return Err(e),
                Err(e) => self.print_error(&e).await?,
            }
        }

        // Input ran out without QUIT: still say goodbye.
        let reply = client.quit().await?;
        self.print_reply(&reply).await?;
        Ok(())
    }

    async fn execute(&mut self, client: &mut FtpClient, line: &str) -> Result<Step, FtpError> {
        let command = parse_command(line);
        if !self.logged_in && !command.allowed_unauthenticated() {
            self.print("Not logged in. Use USER and PASS first.").await?;
            return Ok(Step::Continue);
        }

        match command {
            Command::Quit => return Ok(Step::Quit),
            Command::User(_) => {
                self.logged_in = false;
                let reply = client.raw(line).await?;
                self.print_reply(&reply).await?;
            }
            Command::Pass(_) => {
                let reply = client.raw(line).await?;
                self.logged_in = reply.code() == LOGIN_SUCCESS;
                self.print_reply(&reply).await?;
            }
            Command::Type(arg) => {
                let reply = match TransferType::from_arg(&arg) {
                    Some(transfer_type) => client.set_type(transfer_type).await?,
                    None => client.raw(line).await?,
                };
                self.print_reply(&reply).await?;
            }
            Command::Port(_) => {
                client.set_passive(false);
                self.print("Active mode: the server will connect to us.").await?;
            }
            Command::Pasv => {
                client.set_passive(true);
                self.print("Passive mode: we will connect to the server.").await?;
            }
            Command::List => {
                let (names, reply) = client.list().await?;
                for name in names {
                    self.print(&name).await?;
                }
                self.print_reply(&reply).await?;
            }
            Command::Retr(name) => self.retrieve(client, &name).await?,
            Command::Stor(name) => self.store(client, &name).await?,
            Command::Help(_) | Command::Unknown(_) => {
                let reply = client.raw(line).await?;
                self.print_reply(&reply).await?;
            }
        }
        Ok(Step::Continue)
    }

    async fn retrieve(&mut self, client: &mut FtpClient, name: &str) -> Result<(), FtpError> {
        let path = self.local_path(name)?;
        let mut file = tokio::fs::File::create(&path).await?;
        match client.retrieve(name, &mut file).await {
            Ok((bytes, reply)) => {
                self.print_reply(&reply).await?;
                self.print(&format!("{} bytes saved to {}", bytes, path.display()))
                    .await?;
                Ok(())
            }
            Err(e) => {
                drop(file);
                if let Err(remove) = tokio::fs::remove_file(&path).await {
                    warn!("Could not remove partial file {}: {}", path.display(), remove);
                }
                Err(e)
            }
        }
    }

    async fn store(&mut self, client: &mut FtpClient, name: &str) -> Result<(), FtpError> {
        let path = self.local_path(name)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                self.print(&format!("Cannot open local file {}: {}", path.display(), e))
                    .await?;
                return Ok(());
            }
        };
        let (bytes, reply) = client.store(name, file).await?;
        self.print_reply(&reply).await?;
        self.print(&format!("{} bytes sent", bytes)).await?;
        Ok(())
    }

    fn local_path(&self, name: &str) -> Result<PathBuf, FtpError> {
        Ok(local_file(&self.local_dir, name)?)
    }

    async fn print_reply(&mut self, reply: &Reply) -> io::Result<()> {
        self.print(&reply.to_string()).await
    }

    async fn print_error(&mut self, err: &FtpError) -> io::Result<()> {
        match err {
            FtpError::Rejected { code, text } => self.print(&format!("{} {}", code, text)).await,
            other => self.print(&format!("Error: {}", other)).await,
        }
    }

    async fn print(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await
    }
}

fn local_file(dir: &Path, name: &str) -> Result<PathBuf, crate::error::StorageError> {
    Ok(dir.join(sanitize_filename(name)?))
}

/// Errors after which the control connection is unusable.
fn is_fatal(err: &FtpError) -> bool {
    match err {
        FtpError::IoError(e) => matches!(
            e.kind(),
            io::ErrorKind::UnexpectedEof
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_names_stay_in_the_local_directory() {
        let dir = Path::new("/tmp/downloads");
        assert_eq!(
            local_file(dir, "report.txt").unwrap(),
            PathBuf::from("/tmp/downloads/report.txt")
        );
        assert!(local_file(dir, "../etc/passwd").is_err());
        assert!(local_file(dir, "/etc/passwd").is_err());
    }

    #[test]
    fn lost_control_connection_is_fatal() {
        let eof = FtpError::IoError(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(is_fatal(&eof));
        let rejected = FtpError::Rejected {
            code: 550,
            text: "File not found.".into(),
        };
        assert!(!is_fatal(&rejected));
    }
}
