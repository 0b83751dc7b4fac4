//! Blocking socket transports.

use std::{
    io::{Read, Write},
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket},
    time::Duration,
};

use tracing::{debug, trace};

use crate::{
    Error,
    connection::{Connection, MAX_DATAGRAM_SIZE},
};

fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>, Error> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    if addrs.is_empty() {
        return Err(Error::DnsLookupFailed);
    }
    Ok(addrs)
}

/// A TCP stream where every read and write is bounded by a timeout.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
}

impl TcpConnection {
    /// Connect to `host:port`, trying each resolved address in turn.
    ///
    /// # Errors
    /// If the host does not resolve or no address accepts the connection in
    /// time.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, Error> {
        let mut last_err = Error::DnsLookupFailed;
        for addr in resolve(host, port)? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    debug!(%addr, "connected over tcp");
                    return Self::from_stream(stream, timeout);
                }
                Err(e) => last_err = e.into(),
            }
        }
        Err(last_err)
    }

    /// Wrap an already connected stream.
    ///
    /// # Errors
    /// If the socket options cannot be applied.
    pub fn from_stream(stream: TcpStream, timeout: Duration) -> Result<Self, Error> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        Ok(Self { stream })
    }
}

impl Connection for TcpConnection {
    fn read(&mut self, length: usize) -> Result<Vec<u8>, Error> {
        let mut result = vec![0; length];
        let mut filled = 0;
        while filled < length {
            match self.stream.read(&mut result[filled..]) {
                Ok(0) => return Err(Error::ConnectionClosed),
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        trace!(length, "tcp read");
        Ok(result)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        trace!(length = data.len(), "tcp write");
        self.stream.write_all(data)?;
        Ok(())
    }
}

/// A UDP socket connected to a single peer. Every read is one datagram.
#[derive(Debug)]
pub struct UdpConnection {
    socket: UdpSocket,
}

impl UdpConnection {
    /// Bind an ephemeral local port and connect it to `host:port`.
    ///
    /// # Errors
    /// If the host does not resolve or the socket cannot be set up.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, Error> {
        let addr = resolve(host, port)?[0];
        let local = if addr.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(local)?;
        socket.connect(addr)?;
        socket.set_read_timeout(Some(timeout))?;
        socket.set_write_timeout(Some(timeout))?;
        debug!(%addr, "connected over udp");
        Ok(Self { socket })
    }
}

impl Connection for UdpConnection {
    /// Receives one datagram. `length` is advisory: the whole datagram is
    /// returned whatever its size.
    fn read(&mut self, _length: usize) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0; MAX_DATAGRAM_SIZE];
        let received = self.socket.recv(&mut buf)?;
        buf.truncate(received);
        trace!(length = received, "udp datagram received");
        Ok(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        trace!(length = data.len(), "udp datagram sent");
        self.socket.send(data)?;
        Ok(())
    }
}
