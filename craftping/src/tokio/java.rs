use std::time::Instant;

use tracing::debug;

use super::{
    AsyncConnection, AsyncQueryPinger,
    net::{TcpConnection, UdpConnection},
};
use crate::{
    DEFAULT_JAVA_PORT, Error, JavaServer, QueryResponse, StatusPinger, StatusResponse,
    StatusState, address, retry::Retry,
};

/// The async form of [`StatusPinger`].
#[derive(Debug)]
pub struct AsyncStatusPinger<'a, C> {
    inner: StatusPinger<'a, C>,
}

impl<'a, C> AsyncStatusPinger<'a, C> {
    pub fn new(connection: &'a mut C, host: &str, port: u16) -> Self {
        Self::from(StatusPinger::new(connection, host, port))
    }

    #[must_use]
    pub fn with_version(self, version: i32) -> Self {
        Self::from(self.inner.with_version(version))
    }

    #[must_use]
    pub fn with_token(self, token: i64) -> Self {
        Self::from(self.inner.with_token(token))
    }

    #[must_use]
    pub const fn token(&self) -> i64 {
        self.inner.token()
    }

    #[must_use]
    pub const fn state(&self) -> StatusState {
        self.inner.state()
    }
}

impl<'a, C> From<StatusPinger<'a, C>> for AsyncStatusPinger<'a, C> {
    fn from(inner: StatusPinger<'a, C>) -> Self {
        Self { inner }
    }
}

impl<C: AsyncConnection> AsyncStatusPinger<'_, C> {
    /// # Errors
    /// If called twice, or the write fails.
    pub async fn handshake(&mut self) -> Result<(), Error> {
        let mut packet = self.inner.begin_handshake()?;
        self.inner.connection().write_buffer(&mut packet).await?;
        debug!("sent handshake");
        Ok(())
    }

    /// # Errors
    /// If the server answers with anything but a well-formed status packet.
    pub async fn read_status(&mut self) -> Result<StatusResponse, Error> {
        let mut request = self.inner.begin_status()?;
        let connection = self.inner.connection();
        connection.write_buffer(&mut request).await?;
        let response = connection.read_buffer().await?;
        self.inner.finish_status(response)
    }

    /// # Errors
    /// If the pong is malformed or echoes a different token.
    pub async fn test_ping(&mut self) -> Result<f64, Error> {
        let mut request = self.inner.begin_ping()?;
        let sent = Instant::now();
        let connection = self.inner.connection();
        connection.write_buffer(&mut request).await?;
        let response = connection.read_buffer().await?;
        self.inner.finish_ping(response, sent)
    }
}

impl JavaServer {
    /// Async form of [`JavaServer::lookup`].
    ///
    /// # Errors
    /// If the address cannot be parsed.
    pub async fn lookup_async(address: &str) -> Result<Self, Error> {
        let (host, port) = address::parse_address(address)?;
        if let Some(port) = port {
            return Ok(Self::new(host, port));
        }
        Ok(match address::srv_lookup(&host).await {
            Some((host, port)) => Self::new(host, port),
            None => Self::new(host, DEFAULT_JAVA_PORT),
        })
    }

    /// Async form of [`JavaServer::ping`].
    ///
    /// # Errors
    /// If every attempt fails; the error of the last attempt is returned.
    pub async fn ping_async(&self) -> Result<f64, Error> {
        Retry::new(self.tries)?
            .run_async(|| async move {
                let mut connection =
                    TcpConnection::connect(&self.host, self.port, self.timeout).await?;
                let mut pinger = AsyncStatusPinger::from(self.pinger(&mut connection));
                pinger.handshake().await?;
                pinger.test_ping().await
            })
            .await
    }

    /// Async form of [`JavaServer::status`].
    ///
    /// # Errors
    /// If every attempt fails; the error of the last attempt is returned.
    pub async fn status_async(&self) -> Result<StatusResponse, Error> {
        Retry::new(self.tries)?
            .run_async(|| async move {
                let mut connection =
                    TcpConnection::connect(&self.host, self.port, self.timeout).await?;
                let mut pinger = AsyncStatusPinger::from(self.pinger(&mut connection));
                pinger.handshake().await?;
                let mut status = pinger.read_status().await?;
                status.latency = Some(pinger.test_ping().await?);
                Ok(status)
            })
            .await
    }

    /// Async form of [`JavaServer::query`].
    ///
    /// # Errors
    /// If every attempt fails; the error of the last attempt is returned.
    pub async fn query_async(&self) -> Result<QueryResponse, Error> {
        let ip = address::ip_lookup(&self.host)
            .await
            .map_or_else(|| self.host.clone(), |ip| ip.to_string());
        let ip = ip.as_str();
        Retry::new(self.tries)?
            .run_async(|| async move {
                let mut connection = UdpConnection::connect(ip, self.port, self.timeout).await?;
                let mut querier = AsyncQueryPinger::new(&mut connection);
                querier.handshake().await?;
                querier.read_query().await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Buffer, Connection};

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut packet = Buffer::new();
        Connection::write(&mut packet, payload).unwrap();
        crate::connection::frame(&mut packet).unwrap()
    }

    #[tokio::test]
    async fn status_over_a_buffer() {
        let json = br#"{"description":"A Minecraft Server","players":{"max":20,"online":0},"version":{"name":"1.8","protocol":47}}"#;
        let mut body = Buffer::new();
        body.write_varint(0).unwrap();
        body.write_utf(std::str::from_utf8(json).unwrap()).unwrap();
        let mut connection = Buffer::new();
        connection.receive(&framed(&body.flush().unwrap()));

        let mut pinger = AsyncStatusPinger::new(&mut connection, "localhost", 25565);
        pinger.handshake().await.unwrap();
        let status = pinger.read_status().await.unwrap();
        assert_eq!(status.description, "A Minecraft Server");
        assert_eq!(pinger.state(), StatusState::StatusReceived);
        assert!(connection.sent().starts_with(&[0x0F, 0x00, 0x2F]));
    }

    #[tokio::test]
    async fn ping_checks_the_token() {
        let mut pong = Buffer::new();
        pong.write_varint(1).unwrap();
        pong.write_long(999).unwrap();
        let mut connection = Buffer::new();
        connection.receive(&framed(&pong.flush().unwrap()));

        let mut pinger =
            AsyncStatusPinger::new(&mut connection, "localhost", 25565).with_token(999);
        pinger.handshake().await.unwrap();
        assert!(pinger.test_ping().await.unwrap() >= 0.0);
        assert_eq!(pinger.state(), StatusState::PingReceived);
    }

    #[tokio::test]
    async fn out_of_order_calls_fail() {
        let mut connection = Buffer::new();
        let mut pinger = AsyncStatusPinger::new(&mut connection, "localhost", 25565);
        assert!(matches!(
            pinger.read_status().await,
            Err(Error::InvalidState { .. })
        ));
        assert!(connection.sent().is_empty());
    }

    #[tokio::test]
    async fn lookup_with_port_skips_dns() {
        let server = JavaServer::lookup_async("127.0.0.1:25570").await.unwrap();
        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.port, 25570);
        let server = JavaServer::lookup_async("127.0.0.1").await.unwrap();
        assert_eq!(server.port, DEFAULT_JAVA_PORT);
    }
}
