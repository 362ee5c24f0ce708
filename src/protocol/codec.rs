//! Control-channel framing.
//!
//! Commands and replies are CRLF-terminated ASCII lines. The reader enforces
//! the command length limit without buffering an oversized line, and rejects
//! non-printable bytes; the writer frames replies and commands.

use log::debug;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;
use crate::protocol::responses::Reply;

pub const MAX_COMMAND_LENGTH: usize = 512;

/// A control line that passed or failed syntax validation.
pub type ControlLine = Result<String, ProtocolError>;

/// Reads CRLF-terminated lines from the control connection.
pub struct ControlReader<R> {
    inner: R,
    max_len: usize,
}

impl<R: AsyncBufRead + Unpin> ControlReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_limit(inner, MAX_COMMAND_LENGTH)
    }

    pub fn with_limit(inner: R, max_len: usize) -> Self {
        Self { inner, max_len }
    }

    /// Reads the next command line.
    ///
    /// `Ok(None)` on end of stream. Lines longer than the limit, or containing
    /// bytes outside printable ASCII, come back as `Some(Err(_))` with the rest
    /// of the line already discarded.
    pub async fn next_line(&mut self) -> std::io::Result<Option<ControlLine>> {
        let mut buf = Vec::new();
        // Room for the longest allowed line plus CRLF.
        let limit = (self.max_len + 2) as u64;
        let n = (&mut self.inner)
            .take(limit)
            .read_until(b'\n', &mut buf)
            .await?;
        if n == 0 {
            return Ok(None);
        }

        if !buf.ends_with(b"\n") && n as u64 == limit {
            let discarded = self.discard_line().await?;
            debug!("Discarded over-long control line ({} bytes)", n + discarded);
            return Ok(Some(Err(ProtocolError::LineTooLong(n + discarded))));
        }

        Ok(Some(validate_line(strip_terminator(&buf), self.max_len)))
    }

    /// Reads one reply, folding multi-line replies into a single `Reply`.
    ///
    /// `Ok(None)` if the peer closed the connection.
    pub async fn read_reply(&mut self) -> Result<Option<Reply>, crate::error::FtpError> {
        let mut line = String::new();
        if self.inner.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let (first, multiline) = Reply::parse_line(&line)?;
        if !multiline {
            return Ok(Some(first));
        }

        let mut text = first.text().to_string();
        loop {
            line.clear();
            if self.inner.read_line(&mut line).await? == 0 {
                return Ok(None);
            }
            let done = Reply::ends_multiline(first.code(), &line);
            let content = line.trim_end_matches(['\r', '\n']);
            text.push('\n');
            text.push_str(if done {
                content.get(4..).unwrap_or("")
            } else {
                content
            });
            if done {
                return Ok(Some(Reply::new(first.code(), text)));
            }
        }
    }

    async fn discard_line(&mut self) -> std::io::Result<usize> {
        let mut total = 0;
        let mut scratch = Vec::new();
        loop {
            scratch.clear();
            let n = (&mut self.inner)
                .take(self.max_len as u64)
                .read_until(b'\n', &mut scratch)
                .await?;
            total += n;
            if n == 0 || scratch.ends_with(b"\n") {
                return Ok(total);
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn strip_terminator(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

/// Applies the control-line policy: at most `max_len` bytes, printable ASCII only.
pub fn validate_line(line: &[u8], max_len: usize) -> ControlLine {
    if line.len() > max_len {
        return Err(ProtocolError::LineTooLong(line.len()));
    }
    if !line.iter().all(|b| (0x20..=0x7e).contains(b)) {
        return Err(ProtocolError::NonPrintable);
    }
    // Printable ASCII is valid UTF-8.
    String::from_utf8(line.to_vec()).map_err(|_| ProtocolError::NonPrintable)
}

/// Writes framed lines to the control connection.
pub struct ControlWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> ControlWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn send_reply(&mut self, reply: &Reply) -> std::io::Result<()> {
        self.write_line(&reply.to_wire()).await
    }

    pub async fn send_command(&mut self, command: &str) -> std::io::Result<()> {
        self.write_line(&format!("{}\r\n", command)).await
    }

    async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.inner.write_all(line.as_bytes()).await?;
        self.inner.flush().await
    }

    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        self.inner.shutdown().await
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    fn reader(input: &[u8]) -> ControlReader<BufReader<&[u8]>> {
        ControlReader::new(BufReader::new(input))
    }

    #[tokio::test]
    async fn strips_crlf_and_lone_lf() {
        let mut r = reader(b"USER alice\r\nPASS secret\nQUIT");
        assert_eq!(r.next_line().await.unwrap().unwrap().unwrap(), "USER alice");
        assert_eq!(r.next_line().await.unwrap().unwrap().unwrap(), "PASS secret");
        assert_eq!(r.next_line().await.unwrap().unwrap().unwrap(), "QUIT");
        assert!(r.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn line_of_exactly_512_bytes_is_accepted() {
        let mut input = vec![b'A'; 512];
        input.extend_from_slice(b"\r\n");
        let mut r = reader(&input);
        assert_eq!(r.next_line().await.unwrap().unwrap().unwrap().len(), 512);
    }

    #[tokio::test]
    async fn over_long_line_is_rejected_and_skipped() {
        let mut input = vec![b'A'; 513];
        input.extend_from_slice(b"\r\nQUIT\r\n");
        let mut r = reader(&input);
        assert!(matches!(
            r.next_line().await.unwrap().unwrap(),
            Err(ProtocolError::LineTooLong(_))
        ));
        assert_eq!(r.next_line().await.unwrap().unwrap().unwrap(), "QUIT");

        let mut input = vec![b'B'; 5000];
        input.extend_from_slice(b"\r\nPASV\r\n");
        let mut r = reader(&input);
        assert!(matches!(
            r.next_line().await.unwrap().unwrap(),
            Err(ProtocolError::LineTooLong(_))
        ));
        assert_eq!(r.next_line().await.unwrap().unwrap().unwrap(), "PASV");
    }

    #[tokio::test]
    async fn control_bytes_are_rejected() {
        let mut r = reader(b"USER al\x01ice\r\nUSER \xffx\r\n");
        assert!(matches!(
            r.next_line().await.unwrap().unwrap(),
            Err(ProtocolError::NonPrintable)
        ));
        assert!(matches!(
            r.next_line().await.unwrap().unwrap(),
            Err(ProtocolError::NonPrintable)
        ));
    }

    #[tokio::test]
    async fn multiline_replies_are_folded() {
        let mut r = reader(b"214-Commands:\r\n USER PASS\r\n214 End\r\n200 OK\r\n");
        let reply = r.read_reply().await.unwrap().unwrap();
        assert_eq!(reply.code(), 214);
        assert_eq!(reply.text(), "Commands:\n USER PASS\nEnd");
        assert_eq!(r.read_reply().await.unwrap().unwrap().code(), 200);
        assert!(r.read_reply().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn writer_frames_replies() {
        let mut w = ControlWriter::new(Vec::new());
        w.send_reply(&Reply::new(220, "Welcome")).await.unwrap();
        w.send_command("NOOP").await.unwrap();
        assert_eq!(w.into_inner(), b"220 Welcome\r\nNOOP\r\n");
    }
}
