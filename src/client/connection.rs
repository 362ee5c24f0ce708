//! FTP client connection
//!
//! One control connection to a server plus the client's half of the data
//! channel logic. In passive mode the client sends PASV and connects out to
//! the advertised address; in active mode it opens its own listener, sends
//! PORT, and accepts the server's connection once the server replies 150.
//! Either way a fresh PASV or PORT precedes every transfer.

use log::{debug, info};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::error::{FtpError, ProtocolError, StorageError};
use crate::protocol::address;
use crate::protocol::codec::{ControlReader, ControlWriter};
use crate::protocol::commands::redact;
use crate::protocol::responses::{
    ENTERING_PASSIVE, LOGIN_SUCCESS, OK, OPENING_DATA, PASSWORD_REQUIRED, READY, Reply,
    TRANSFER_COMPLETE,
};
use crate::transfer::data_channel::{DataChannel, DataChannelRequest, PassiveListener, PortRange, establish};
use crate::transfer::file_ops::{DEFAULT_BUFFER_SIZE, receive_file, send_raw};
use crate::transfer::modes::{DataMode, TransferType};
use crate::transfer::results::TransferOutcome;

/// Data connection prepared before the transfer command is sent.
enum PendingData {
    /// Already connected to the server's passive listener.
    Connected(DataChannel),
    /// Our listener, announced with PORT, waiting for the server.
    Listening(PassiveListener),
}

pub struct FtpClient {
    reader: ControlReader<BufReader<OwnedReadHalf>>,
    writer: ControlWriter<OwnedWriteHalf>,
    local_ip: Ipv4Addr,
    server_ip: IpAddr,
    mode: DataMode,
    transfer_type: TransferType,
    data_timeout: Option<Duration>,
    buffer_size: usize,
}

impl FtpClient {
    /// Connects and consumes the 220 greeting, which is returned alongside the client.
    pub async fn connect(addr: &str) -> Result<(Self, Reply), FtpError> {
        let stream = TcpStream::connect(addr).await?;
        let local = address::to_v4(stream.local_addr()?)?;
        let server: SocketAddr = stream.peer_addr()?;
        info!("Connected to {} from {}", server, local);

        let (read_half, write_half) = stream.into_split();
        let mut client = Self {
            reader: ControlReader::new(BufReader::new(read_half)),
            writer: ControlWriter::new(write_half),
            local_ip: *local.ip(),
            server_ip: server.ip(),
            mode: DataMode::Active,
            transfer_type: TransferType::Ascii,
            data_timeout: Some(Duration::from_secs(30)),
            buffer_size: DEFAULT_BUFFER_SIZE,
        };

        let greeting = client.read_reply().await?;
        expect_code(&greeting, READY)?;
        Ok((client, greeting))
    }

    /// Bound on data connect/accept waits; `None` waits forever.
    pub fn with_data_timeout(mut self, limit: Option<Duration>) -> Self {
        self.data_timeout = limit;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    pub fn transfer_type(&self) -> TransferType {
        self.transfer_type
    }

    /// Chooses how later transfers open their data connection.
    pub fn set_passive(&mut self, passive: bool) {
        self.mode = if passive {
            DataMode::Passive
        } else {
            DataMode::Active
        };
        info!("Data mode set to {:?}", self.mode);
    }

    /// Sends one command line verbatim and returns the reply.
    pub async fn raw(&mut self, line: &str) -> Result<Reply, FtpError> {
        debug!("Sending: {}", redact(line));
        self.writer.send_command(line).await?;
        self.read_reply().await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<Reply, FtpError> {
        let reply = self.raw(&format!("USER {}", username)).await?;
        expect_code(&reply, PASSWORD_REQUIRED)?;
        let reply = self.raw(&format!("PASS {}", password)).await?;
        expect_code(&reply, LOGIN_SUCCESS)?;
        Ok(reply)
    }

    pub async fn set_type(&mut self, transfer_type: TransferType) -> Result<Reply, FtpError> {
        let reply = self.raw(&format!("TYPE {}", transfer_type.code())).await?;
        expect_code(&reply, OK)?;
        self.transfer_type = transfer_type;
        Ok(reply)
    }

    pub async fn help(&mut self, topic: Option<&str>) -> Result<Reply, FtpError> {
        match topic {
            Some(topic) => self.raw(&format!("HELP {}", topic)).await,
            None => self.raw("HELP").await,
        }
    }

    pub async fn quit(mut self) -> Result<Reply, FtpError> {
        let reply = self.raw("QUIT").await?;
        let _ = self.writer.shutdown().await;
        Ok(reply)
    }

    /// LIST: the names in the user's directory, and the closing reply.
    pub async fn list(&mut self) -> Result<(Vec<String>, Reply), FtpError> {
        let mut channel = self.start_transfer("LIST").await?;
        let mut listing = String::new();
        let read = channel.read_to_string(&mut listing).await;
        drop(channel);
        let reply = self.finish_transfer(read.map(|_| ())).await?;
        let names = listing
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Ok((names, reply))
    }

    /// RETR: streams the remote file into `sink`, returning the byte count.
    pub async fn retrieve<W>(&mut self, name: &str, sink: W) -> Result<(u64, Reply), FtpError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut channel = self.start_transfer(&format!("RETR {}", name)).await?;
        let report = receive_file(&mut channel, sink, self.buffer_size).await;
        drop(channel);
        let reply = self.finish_transfer(outcome_to_io(report.outcome)).await?;
        Ok((report.bytes, reply))
    }

    /// STOR: streams `source` to the server unchanged, returning the byte count.
    pub async fn store<R>(&mut self, name: &str, source: R) -> Result<(u64, Reply), FtpError>
    where
        R: AsyncRead + Unpin,
    {
        let mut channel = self.start_transfer(&format!("STOR {}", name)).await?;
        let report = send_raw(source, &mut channel, self.buffer_size).await;
        // The server reads until end of stream, so close before waiting for 226.
        let closed = channel.close().await;
        let status = outcome_to_io(report.outcome).and(closed);
        let reply = self.finish_transfer(status).await?;
        Ok((report.bytes, reply))
    }

    /// Prepares the data endpoint, sends `command`, and returns a connected
    /// channel once the server answers 150.
    async fn start_transfer(&mut self, command: &str) -> Result<DataChannel, FtpError> {
        let pending = self.prepare_data().await?;
        let reply = self.raw(command).await?;
        expect_code(&reply, OPENING_DATA)?;

        match pending {
            PendingData::Connected(channel) => Ok(channel),
            PendingData::Listening(listener) => {
                let request = DataChannelRequest::Accept {
                    listener: &listener,
                    expected_peer: Some(self.server_ip),
                };
                Ok(establish(request, self.data_timeout).await?)
            }
        }
    }

    async fn prepare_data(&mut self) -> Result<PendingData, FtpError> {
        match self.mode {
            DataMode::Passive => {
                let reply = self.raw("PASV").await?;
                expect_code(&reply, ENTERING_PASSIVE)?;
                let target = address::parse_pasv_reply(reply.text())?;
                let channel = establish(
                    DataChannelRequest::Connect(SocketAddr::V4(target)),
                    self.data_timeout,
                )
                .await?;
                Ok(PendingData::Connected(channel))
            }
            DataMode::Active => {
                let listener = PassiveListener::bind(self.local_ip, PortRange::any()).await?;
                let reply = self
                    .raw(&format!("PORT {}", address::encode(listener.local_addr())))
                    .await?;
                expect_code(&reply, OK)?;
                Ok(PendingData::Listening(listener))
            }
        }
    }

    /// Reads the terminal reply; a local data-side failure is reported only
    /// after the server's verdict has been consumed.
    async fn finish_transfer(&mut self, local: io::Result<()>) -> Result<Reply, FtpError> {
        let reply = self.read_reply().await?;
        local.map_err(StorageError::Io)?;
        expect_code(&reply, TRANSFER_COMPLETE)?;
        Ok(reply)
    }

    async fn read_reply(&mut self) -> Result<Reply, FtpError> {
        let reply = self.reader.read_reply().await?.ok_or_else(|| {
            FtpError::IoError(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the control connection",
            ))
        })?;
        debug!("Received: {}", reply);
        Ok(reply)
    }
}

fn expect_code(reply: &Reply, code: u16) -> Result<(), FtpError> {
    if reply.code() == code {
        return Ok(());
    }
    if reply.is_success() {
        return Err(ProtocolError::UnexpectedReply(reply.to_string()).into());
    }
    Err(FtpError::Rejected {
        code: reply.code(),
        text: reply.text().to_string(),
    })
}

fn outcome_to_io(outcome: TransferOutcome) -> io::Result<()> {
    match outcome {
        TransferOutcome::Success => Ok(()),
        TransferOutcome::ConnectionAborted => Err(io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "data connection closed mid-transfer",
        )),
        TransferOutcome::NotFound | TransferOutcome::IoError => {
            Err(io::Error::other("local file error during transfer"))
        }
    }
}
