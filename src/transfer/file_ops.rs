//! Module `file_ops`
//!
//! Moves bytes between a data channel and storage for LIST, RETR and STOR.
//! Every function here streams in chunks; nothing holds a whole file or a
//! whole listing in memory. Read failures on the storage side map to
//! [`TransferOutcome::IoError`], failures on the data channel to
//! [`TransferOutcome::ConnectionAborted`].

use log::{error, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use crate::storage::EntryStream;
use crate::transfer::modes::TransferType;
use crate::transfer::results::{TransferOutcome, TransferReport};

pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Writes one CRLF-terminated name per entry to `data`.
pub async fn send_listing<W>(entries: &mut dyn EntryStream, data: &mut W) -> TransferReport
where
    W: AsyncWrite + Unpin,
{
    let mut out = BufWriter::new(data);
    let mut sent = 0u64;

    loop {
        let name = match entries.next_entry().await {
            Ok(Some(name)) => name,
            Ok(None) => break,
            Err(e) => {
                error!("Directory enumeration failed: {}", e);
                return TransferReport::new(TransferOutcome::IoError, sent);
            }
        };
        let line = format!("{}\r\n", name);
        if let Err(e) = out.write_all(line.as_bytes()).await {
            warn!("Listing aborted by peer: {}", e);
            return TransferReport::new(TransferOutcome::ConnectionAborted, sent);
        }
        sent += line.len() as u64;
    }

    finish(out, sent).await
}

/// Streams a stored file to `data` for RETR.
///
/// In ASCII type every line, including a final unterminated one, is sent
/// with a CRLF terminator. In binary type bytes are copied unchanged.
pub async fn send_file<R, W>(
    source: R,
    data: &mut W,
    transfer_type: TransferType,
    buffer_size: usize,
) -> TransferReport
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match transfer_type {
        TransferType::Ascii => send_ascii(source, data, buffer_size).await,
        TransferType::Binary => send_raw(source, data, buffer_size).await,
    }
}

async fn send_ascii<R, W>(source: R, data: &mut W, buffer_size: usize) -> TransferReport
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let cap = buffer_size.max(1) as u64;
    let mut lines = BufReader::with_capacity(buffer_size.max(1), source);
    let mut out = BufWriter::with_capacity(buffer_size.max(1), data);
    let mut line = Vec::new();
    let mut sent = 0u64;
    // Set while a line longer than `cap` is being sent in pieces.
    let mut mid_line = false;

    loop {
        // A CR held back from the previous piece stays at the front.
        let carried = line.len();
        let n = match (&mut lines).take(cap).read_until(b'\n', &mut line).await {
            Ok(n) => n,
            Err(e) => {
                error!("Failed reading file: {}", e);
                return TransferReport::new(TransferOutcome::IoError, sent);
            }
        };

        let mut carry = false;
        if n == 0 {
            if carried == 0 && !mid_line {
                break;
            }
            line.clear();
            line.extend_from_slice(b"\r\n");
        } else if line.ends_with(b"\n") || (n as u64) < cap {
            if line.ends_with(b"\n") {
                line.pop();
            }
            if line.ends_with(b"\r") {
                line.pop();
            }
            line.extend_from_slice(b"\r\n");
            mid_line = false;
        } else {
            // Piece of an over-long line: no terminator yet.
            carry = line.ends_with(b"\r");
            if carry {
                line.pop();
            }
            mid_line = true;
        }

        if let Err(e) = out.write_all(&line).await {
            warn!("Transfer aborted by peer: {}", e);
            return TransferReport::new(TransferOutcome::ConnectionAborted, sent);
        }
        sent += line.len() as u64;
        line.clear();
        if carry {
            line.push(b'\r');
        }
        if n == 0 {
            break;
        }
    }

    finish(out, sent).await
}

/// Copies `source` to `data` byte for byte in chunks of `buffer_size`.
pub async fn send_raw<R, W>(mut source: R, data: &mut W, buffer_size: usize) -> TransferReport
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut sent = 0u64;

    loop {
        let n = match source.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                error!("Failed reading file: {}", e);
                return TransferReport::new(TransferOutcome::IoError, sent);
            }
        };
        if let Err(e) = data.write_all(&buffer[..n]).await {
            warn!("Transfer aborted by peer: {}", e);
            return TransferReport::new(TransferOutcome::ConnectionAborted, sent);
        }
        sent += n as u64;
    }

    match data.flush().await {
        Ok(()) => TransferReport::new(TransferOutcome::Success, sent),
        Err(e) => {
            warn!("Transfer aborted by peer: {}", e);
            TransferReport::new(TransferOutcome::ConnectionAborted, sent)
        }
    }
}

/// Copies `data` into `sink` chunk by chunk until the peer closes the channel.
pub async fn receive_file<R, W>(data: &mut R, mut sink: W, buffer_size: usize) -> TransferReport
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut received = 0u64;

    loop {
        let n = match data.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!("Data connection failed mid-transfer: {}", e);
                return TransferReport::new(TransferOutcome::ConnectionAborted, received);
            }
        };
        if let Err(e) = sink.write_all(&buffer[..n]).await {
            error!("Failed writing file: {}", e);
            return TransferReport::new(TransferOutcome::IoError, received);
        }
        received += n as u64;
    }

    match sink.flush().await {
        Ok(()) => TransferReport::new(TransferOutcome::Success, received),
        Err(e) => {
            error!("Failed flushing file: {}", e);
            TransferReport::new(TransferOutcome::IoError, received)
        }
    }
}

async fn finish<W: AsyncWrite + Unpin>(mut out: BufWriter<W>, sent: u64) -> TransferReport {
    match out.flush().await {
        Ok(()) => TransferReport::new(TransferOutcome::Success, sent),
        Err(e) => {
            warn!("Transfer aborted by peer: {}", e);
            TransferReport::new(TransferOutcome::ConnectionAborted, sent)
        }
    }
}
