use std::time::Instant;

use super::{AsyncConnection, net::UdpConnection};
use crate::{
    BedrockResponse, BedrockServer, Error,
    bedrock::{UNCONNECTED_PING_PACKET, elapsed_ms},
    retry::Retry,
};

/// The async form of [`crate::BedrockPinger`].
#[derive(Debug)]
pub struct AsyncBedrockPinger<'a, C> {
    connection: &'a mut C,
}

impl<'a, C: AsyncConnection> AsyncBedrockPinger<'a, C> {
    pub const fn new(connection: &'a mut C) -> Self {
        Self { connection }
    }

    /// # Errors
    /// If no pong arrives or it cannot be decoded.
    pub async fn read_status(&mut self) -> Result<BedrockResponse, Error> {
        let start = Instant::now();
        self.connection.write(&UNCONNECTED_PING_PACKET).await?;
        let data = self.connection.read_datagram().await?;
        BedrockResponse::parse(&data, elapsed_ms(start))
    }
}

impl BedrockServer {
    /// Async form of [`BedrockServer::status`].
    ///
    /// # Errors
    /// If every attempt fails; the error of the last attempt is returned.
    pub async fn status_async(&self) -> Result<BedrockResponse, Error> {
        Retry::new(self.tries)?
            .run_async(|| async move {
                let mut connection =
                    UdpConnection::connect(&self.host, self.port, self.timeout).await?;
                AsyncBedrockPinger::new(&mut connection).read_status().await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Buffer, bedrock::OFFLINE_MESSAGE_DATA_ID};

    #[tokio::test]
    async fn pings_a_buffer() {
        let payload = b"MCPE;Dedicated Server;527;1.19.1;2;10;13253860892328930865;Bedrock level;Survival;1;19132;19133;";
        let mut pong = vec![0x1c];
        pong.extend([0; 16]);
        pong.extend(OFFLINE_MESSAGE_DATA_ID);
        pong.extend(u16::try_from(payload.len()).unwrap().to_be_bytes());
        pong.extend(payload);

        let mut connection = Buffer::from(pong.as_slice());
        let response = AsyncBedrockPinger::new(&mut connection)
            .read_status()
            .await
            .unwrap();
        assert_eq!(response.motd, "Dedicated Server");
        assert_eq!(response.map.as_deref(), Some("Bedrock level"));
        assert_eq!(response.gamemode.as_deref(), Some("Survival"));
        assert_eq!(response.port_v6, Some(19133));
        assert_eq!(connection.sent(), UNCONNECTED_PING_PACKET);
    }
}
