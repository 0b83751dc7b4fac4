//! Async socket transports. Every operation is bounded by the timeout given
//! at connect time.

use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    time::Duration,
};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpStream, UdpSocket, lookup_host},
    time::timeout,
};
use tracing::{debug, trace};

use super::AsyncConnection;
use crate::{Error, connection::MAX_DATAGRAM_SIZE};

#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    timeout: Duration,
}

impl TcpConnection {
    /// Connect to `host:port`, trying each resolved address in turn.
    ///
    /// # Errors
    /// If the host does not resolve or no address accepts the connection in
    /// time.
    pub async fn connect(host: &str, port: u16, duration: Duration) -> Result<Self, Error> {
        let stream = timeout(duration, TcpStream::connect((host, port))).await??;
        stream.set_nodelay(true)?;
        debug!(%host, port, "connected over tcp");
        Ok(Self::from_stream(stream, duration))
    }

    #[must_use]
    pub const fn from_stream(stream: TcpStream, timeout: Duration) -> Self {
        Self { stream, timeout }
    }
}

impl AsyncConnection for TcpConnection {
    async fn read(&mut self, length: usize) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0; length];
        timeout(self.timeout, self.stream.read_exact(&mut buf)).await??;
        trace!(length, "tcp read");
        Ok(buf)
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        trace!(length = data.len(), "tcp write");
        timeout(self.timeout, self.stream.write_all(data)).await??;
        Ok(())
    }
}

/// A UDP socket connected to a single peer. Every read is one datagram.
#[derive(Debug)]
pub struct UdpConnection {
    socket: UdpSocket,
    timeout: Duration,
}

impl UdpConnection {
    /// Bind an ephemeral local port and connect it to `host:port`.
    ///
    /// # Errors
    /// If the host does not resolve or the socket cannot be set up.
    pub async fn connect(host: &str, port: u16, duration: Duration) -> Result<Self, Error> {
        let addr = timeout(duration, lookup_host((host, port)))
            .await??
            .next()
            .ok_or(Error::DnsLookupFailed)?;
        let local = if addr.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(addr).await?;
        debug!(%addr, "connected over udp");
        Ok(Self {
            socket,
            timeout: duration,
        })
    }
}

impl AsyncConnection for UdpConnection {
    /// Receives one datagram whatever `length` asks for.
    async fn read(&mut self, _length: usize) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0; MAX_DATAGRAM_SIZE];
        let received = timeout(self.timeout, self.socket.recv(&mut buf)).await??;
        buf.truncate(received);
        trace!(length = received, "udp datagram received");
        Ok(buf)
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        trace!(length = data.len(), "udp datagram sent");
        timeout(self.timeout, self.socket.send(data)).await??;
        Ok(())
    }
}
