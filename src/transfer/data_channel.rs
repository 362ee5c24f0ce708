//! Module `data_channel`
//!
//! Establishes the per-transfer data connection. A session's data endpoint is
//! either a peer address to connect out to (active mode, set by PORT) or a
//! listener owned by the session (passive mode, opened by PASV). Each transfer
//! command turns the endpoint into a [`DataChannelRequest`] and calls
//! [`establish`] exactly once; the resulting [`DataChannel`] is owned by the
//! transfer and closed when it is dropped or explicitly closed.
//!
//! The client side uses the same pieces in the opposite roles: its passive
//! path connects out, its active path binds a [`PassiveListener`] and accepts.

use log::{debug, info, warn};
use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpListener, TcpStream};

use crate::error::ChannelError;
use crate::transfer::modes::DataMode;

/// Inclusive port range for passive listeners. `0..=0` lets the OS choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortRange {
    min: u16,
    max: u16,
}

impl PortRange {
    pub fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_any(&self) -> bool {
        self.min == 0 && self.max == 0
    }

    pub fn ports(&self) -> std::ops::RangeInclusive<u16> {
        self.min..=self.max
    }
}

/// A listening socket waiting for the peer's data connection.
///
/// Closed when dropped; replacing a session's endpoint drops the old listener
/// before the new one is bound.
pub struct PassiveListener {
    listener: TcpListener,
    local: SocketAddrV4,
}

impl PassiveListener {
    /// Binds a listener on `ip`, on the first free port of `ports`.
    pub async fn bind(ip: Ipv4Addr, ports: PortRange) -> Result<Self, ChannelError> {
        if ports.is_any() {
            let listener = TcpListener::bind(SocketAddrV4::new(ip, 0))
                .await
                .map_err(ChannelError::BindFailed)?;
            return Self::from_listener(listener);
        }

        for port in ports.ports() {
            match TcpListener::bind(SocketAddrV4::new(ip, port)).await {
                Ok(listener) => return Self::from_listener(listener),
                Err(e) if e.kind() == io::ErrorKind::AddrInUse => continue,
                Err(e) => return Err(ChannelError::BindFailed(e)),
            }
        }
        Err(ChannelError::NoAvailablePort)
    }

    fn from_listener(listener: TcpListener) -> Result<Self, ChannelError> {
        let local = listener.local_addr().map_err(ChannelError::BindFailed)?;
        let local = crate::protocol::address::to_v4(local)?;
        debug!("Data listener open on {}", local);
        Ok(Self { listener, local })
    }

    pub fn local_addr(&self) -> SocketAddrV4 {
        self.local
    }

    async fn accept(&self, expected_peer: Option<IpAddr>) -> Result<DataChannel, ChannelError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(ChannelError::AcceptFailed)?;

        if let Some(expected) = expected_peer {
            if expected.to_canonical() != peer.ip().to_canonical() {
                warn!(
                    "Rejected data connection from {} on {}, expected {}",
                    peer, self.local, expected
                );
                return Err(ChannelError::PeerMismatch {
                    expected,
                    actual: peer.ip(),
                });
            }
        }

        info!("Data connection accepted from {} on {}", peer, self.local);
        Ok(DataChannel { stream, peer })
    }
}

impl Drop for PassiveListener {
    fn drop(&mut self) {
        debug!("Data listener on {} closed", self.local);
    }
}

/// A session's data endpoint, selected by the last PORT or PASV.
#[derive(Default)]
pub enum DataEndpoint {
    /// Neither PORT nor PASV issued yet.
    #[default]
    Unset,
    Active(SocketAddrV4),
    Passive(PassiveListener),
}

impl DataEndpoint {
    pub fn mode(&self) -> DataMode {
        match self {
            DataEndpoint::Passive(_) => DataMode::Passive,
            DataEndpoint::Unset | DataEndpoint::Active(_) => DataMode::Active,
        }
    }

    /// The connection this endpoint calls for, if any.
    ///
    /// `expected_peer` restricts who may connect to a passive listener.
    pub fn request(&self, expected_peer: Option<IpAddr>) -> Option<DataChannelRequest<'_>> {
        match self {
            DataEndpoint::Unset => None,
            DataEndpoint::Active(addr) => Some(DataChannelRequest::Connect(SocketAddr::V4(*addr))),
            DataEndpoint::Passive(listener) => Some(DataChannelRequest::Accept {
                listener,
                expected_peer,
            }),
        }
    }

    pub fn listener(&self) -> Option<&PassiveListener> {
        match self {
            DataEndpoint::Passive(listener) => Some(listener),
            _ => None,
        }
    }
}

/// What connection a single transfer needs.
pub enum DataChannelRequest<'a> {
    /// Connect out to the peer's listening address.
    Connect(SocketAddr),
    /// Wait for the peer on our listener.
    Accept {
        listener: &'a PassiveListener,
        expected_peer: Option<IpAddr>,
    },
}

/// A connected data stream carrying exactly one transfer.
pub struct DataChannel {
    stream: TcpStream,
    peer: SocketAddr,
}

impl DataChannel {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Flushes and half-closes the stream so the peer sees end of data.
    pub async fn close(mut self) -> io::Result<()> {
        self.stream.flush().await?;
        self.stream.shutdown().await
    }
}

impl AsyncRead for DataChannel {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for DataChannel {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

/// Produces one connected data channel for `request`.
///
/// `limit` bounds the connect/accept wait; `None` waits indefinitely.
pub async fn establish(
    request: DataChannelRequest<'_>,
    limit: Option<Duration>,
) -> Result<DataChannel, ChannelError> {
    match request {
        DataChannelRequest::Connect(addr) => {
            info!("Opening data connection to {}", addr);
            let connect = async {
                let stream = TcpStream::connect(addr)
                    .await
                    .map_err(|e| ChannelError::ConnectFailed(addr, e))?;
                Ok(DataChannel { stream, peer: addr })
            };
            bounded(connect, limit, format!("connect to {}", addr)).await
        }
        DataChannelRequest::Accept {
            listener,
            expected_peer,
        } => {
            info!("Waiting for data connection on {}", listener.local_addr());
            bounded(
                listener.accept(expected_peer),
                limit,
                format!("accept on {}", listener.local_addr()),
            )
            .await
        }
    }
}

async fn bounded<F, T>(fut: F, limit: Option<Duration>, what: String) -> Result<T, ChannelError>
where
    F: Future<Output = Result<T, ChannelError>>,
{
    match limit {
        Some(duration) => tokio::time::timeout(duration, fut)
            .await
            .map_err(|_| ChannelError::Timeout(what))?,
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn accept_yields_connected_channel() {
        let listener = PassiveListener::bind(Ipv4Addr::LOCALHOST, PortRange::any())
            .await
            .unwrap();
        let addr = listener.local_addr();
        let endpoint = DataEndpoint::Passive(listener);

        let peer = tokio::spawn(async move {
            let mut s = TcpStream::connect(addr).await.unwrap();
            s.write_all(b"hello").await.unwrap();
        });

        let request = endpoint.request(Some(IpAddr::V4(Ipv4Addr::LOCALHOST))).unwrap();
        let mut channel = establish(request, Some(Duration::from_secs(5))).await.unwrap();
        let mut buf = Vec::new();
        channel.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hello");
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        // Grab a free port, then close it.
        let addr = {
            let l = PassiveListener::bind(Ipv4Addr::LOCALHOST, PortRange::any())
                .await
                .unwrap();
            l.local_addr()
        };
        let endpoint = DataEndpoint::Active(addr);
        let err = establish(endpoint.request(None).unwrap(), Some(Duration::from_secs(5)))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ChannelError::ConnectFailed(_, _)));
    }

    #[tokio::test]
    async fn accept_times_out_when_nobody_connects() {
        let listener = PassiveListener::bind(Ipv4Addr::LOCALHOST, PortRange::any())
            .await
            .unwrap();
        let endpoint = DataEndpoint::Passive(listener);
        let err = establish(
            endpoint.request(None).unwrap(),
            Some(Duration::from_millis(50)),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ChannelError::Timeout(_)));
    }

    #[tokio::test]
    async fn unset_endpoint_requests_nothing() {
        let endpoint = DataEndpoint::default();
        assert!(endpoint.request(None).is_none());
        assert_eq!(endpoint.mode(), DataMode::Active);
    }

    #[tokio::test]
    async fn dropped_listener_refuses_connections() {
        let listener = PassiveListener::bind(Ipv4Addr::LOCALHOST, PortRange::any())
            .await
            .unwrap();
        let addr = listener.local_addr();
        drop(listener);
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn port_range_skips_ports_in_use() {
        let first = PassiveListener::bind(Ipv4Addr::LOCALHOST, PortRange::any())
            .await
            .unwrap();
        let taken = first.local_addr().port();
        let range = PortRange::new(taken, taken.saturating_add(20));
        let second = PassiveListener::bind(Ipv4Addr::LOCALHOST, range).await.unwrap();
        assert_ne!(second.local_addr().port(), taken);
        assert!(range.ports().contains(&second.local_addr().port()));
    }
}
