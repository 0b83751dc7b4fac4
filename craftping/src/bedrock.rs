//! Implementation of the `RakNet` ping/pong protocol.
//! [Raknet: Unconnected Ping](https://wiki.vg/Raknet_Protocol#Unconnected_Ping)

use std::time::{Duration, Instant};

use tracing::debug;

use crate::{
    DEFAULT_TIMEOUT, DEFAULT_TRIES, Error, address,
    connection::{Buffer, Connection},
    net::UdpConnection,
    retry::Retry,
};

/// Raknets default `OFFLINE_MESSAGE_DATA_ID`.
/// See more: [Raknet: Data Types](https://wiki.vg/Raknet_Protocol#Data_types)
pub const OFFLINE_MESSAGE_DATA_ID: [u8; 16] = [
    0x00, 0xff, 0xff, 0x00, 0xfe, 0xfe, 0xfe, 0xfe, 0xfd, 0xfd, 0xfd, 0xfd, 0x12, 0x34, 0x56, 0x78,
];

/// The default port of a Raknet Bedrock Server.
pub const DEFAULT_PORT: u16 = 19132;

const UNCONNECTED_PING: u8 = 0x01;

/// Packet id, a zero timestamp, then the offline message magic.
pub(crate) const UNCONNECTED_PING_PACKET: [u8; 25] = {
    let mut packet = [0; 25];
    packet[0] = UNCONNECTED_PING;
    let mut i = 0;
    while i < OFFLINE_MESSAGE_DATA_ID.len() {
        packet[9 + i] = OFFLINE_MESSAGE_DATA_ID[i];
        i += 1;
    }
    packet
};

/// Configuration for pinging a Bedrock server.
///
/// # Examples
///
/// ```
/// use craftping::BedrockServer;
/// use std::time::Duration;
///
/// let bedrock_config = BedrockServer {
///     host: "play.nethergames.org".to_string(),
///     timeout: Duration::from_secs(10),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct BedrockServer {
    /// The host name or IP literal of the server.
    pub host: String,
    pub port: u16,
    /// The read and write timeouts for the socket.
    pub timeout: Duration,
    /// The amount of times to try to send the ping packet.
    ///
    /// In case of packet loss an attempt can be made to send more than a single ping.
    pub tries: usize,
}

impl Default for BedrockServer {
    fn default() -> Self {
        Self::new(String::new(), DEFAULT_PORT)
    }
}

impl BedrockServer {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
            tries: DEFAULT_TRIES,
        }
    }

    /// Build a configuration from a `host[:port]` string. No DNS is
    /// involved: Bedrock has no SRV convention.
    ///
    /// # Errors
    /// If the address cannot be parsed.
    pub fn lookup(address: &str) -> Result<Self, Error> {
        let (host, port) = address::parse_address(address)?;
        Ok(Self::new(host, port.unwrap_or(DEFAULT_PORT)))
    }

    /// Send an unconnected ping and decode the pong.
    ///
    /// # Errors
    /// If every attempt fails; the error of the last attempt is returned.
    pub fn status(&self) -> Result<BedrockResponse, Error> {
        Retry::new(self.tries)?.run(|| {
            let mut connection = UdpConnection::connect(&self.host, self.port, self.timeout)?;
            BedrockPinger::new(&mut connection).read_status()
        })
    }
}

/// Sends one unconnected ping over a borrowed datagram connection.
#[derive(Debug)]
pub struct BedrockPinger<'a, C> {
    connection: &'a mut C,
}

impl<'a, C> BedrockPinger<'a, C> {
    pub const fn new(connection: &'a mut C) -> Self {
        Self { connection }
    }
}

impl<C: Connection> BedrockPinger<'_, C> {
    /// # Errors
    /// If no pong arrives or it cannot be decoded.
    pub fn read_status(&mut self) -> Result<BedrockResponse, Error> {
        let start = Instant::now();
        self.connection.write(&UNCONNECTED_PING_PACKET)?;
        let data = self.connection.read_datagram()?;
        BedrockResponse::parse(&data, elapsed_ms(start))
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Represents the edition of a bedrock server.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum BedrockEdition {
    PocketEdition,
    EducationEdition,
    /// An unknown edition string.
    Other(String),
}

impl std::fmt::Display for BedrockEdition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PocketEdition => f.write_str("MCPE"),
            Self::EducationEdition => f.write_str("MCEE"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

impl From<&str> for BedrockEdition {
    fn from(edition: &str) -> Self {
        match edition.to_lowercase().as_ref() {
            "mcpe" => Self::PocketEdition,
            "mcee" => Self::EducationEdition,
            _ => Self::Other(edition.to_string()),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct BedrockVersion {
    /// The server's protocol version (ex: 390).
    pub protocol: i64,
    /// The raw edition string, usually `MCPE`.
    pub brand: String,
    /// The name of the servers version (ex: 1.16.200).
    pub version: String,
}

/// Bedrock Server Payload Response
///
/// See More: [Raknet: Unconnected Pong](https://wiki.vg/Raknet_Protocol#Unconnected_Pong)
#[derive(Clone, Debug, PartialEq)]
pub struct BedrockResponse {
    pub version: BedrockVersion,
    /// The server's edition.
    pub edition: BedrockEdition,
    /// Round trip time of the ping in milliseconds.
    pub latency: f64,
    /// The numbers of players online.
    pub players_online: i64,
    /// The maximum number of players that could be online at once.
    pub players_max: i64,
    /// The first line of the server's Message Of The Day (MOTD).
    ///
    /// In practice, this seems to be the only line that the bedrock clients
    /// display, and therefore the only line servers usually send.
    pub motd: String,
    /// The server's unique id.
    pub server_id: Option<String>,
    /// The second MOTD line, which servers use for the world name.
    pub map: Option<String>,
    /// The game mode the server defaults new users to (e.g. "Survival").
    pub gamemode: Option<String>,
    /// The numerical representation of `gamemode` (e.g. "1").
    pub gamemode_id: Option<i64>,
    /// The port to connect to the server on with an IPv4 address.
    pub port_v4: Option<u16>,
    /// The port to connect to the server on with an IPv6 address.
    pub port_v6: Option<u16>,
}

impl BedrockResponse {
    /// Decode an unconnected pong datagram.
    ///
    /// Layout: packet id, timestamp, server GUID, offline message magic, then
    /// a big-endian length and a `;` separated UTF-8 payload.
    ///
    /// # Errors
    /// If the datagram is truncated, the payload is not UTF-8, or one of the
    /// first six payload fields is missing or malformed.
    pub fn parse(data: &[u8], latency: f64) -> Result<Self, Error> {
        let mut packet = Buffer::from(data);
        packet.skip(1)?;
        let _timestamp = packet.read_long()?;
        let guid = packet.read_long()?;
        packet.skip(OFFLINE_MESSAGE_DATA_ID.len())?;
        let length = usize::from(packet.read_ushort()?);
        let payload = String::from_utf8(packet.read(length)?)
            .map_err(|_| Error::InvalidPacket("pong payload is not UTF-8".into()))?;
        debug!(guid, %payload, "received unconnected pong");
        Self::extract(&payload, latency)
    }

    /// Extracts information from the semicolon-separated payload.
    ///
    /// Edition (MCPE or MCEE for Education Edition)
    /// MOTD line 1
    /// Protocol Version
    /// Version Name
    /// Player Count
    /// Max Player Count
    /// Server Unique ID
    /// MOTD line 2
    /// Game mode
    /// Game mode (numeric)
    /// Port (IPv4)
    /// Port (IPv6)
    pub(crate) fn extract(payload: &str, latency: f64) -> Result<Self, Error> {
        let parts: Vec<&str> = payload.split(';').collect();
        let required = |index: usize, name: &str| {
            parts
                .get(index)
                .copied()
                .ok_or_else(|| Error::InvalidPacket(format!("pong payload has no {name}")))
        };
        let number = |index: usize, name: &str| {
            required(index, name)?
                .trim()
                .parse::<i64>()
                .map_err(|_| Error::InvalidPacket(format!("pong {name} is not a number")))
        };
        let optional = |index: usize| parts.get(index).map(ToString::to_string);

        let brand = required(0, "edition")?;
        Ok(Self {
            version: BedrockVersion {
                protocol: number(2, "protocol version")?,
                brand: brand.to_string(),
                version: required(3, "version name")?.to_string(),
            },
            edition: BedrockEdition::from(brand),
            latency,
            players_online: number(4, "player count")?,
            players_max: number(5, "max player count")?,
            motd: required(1, "motd")?.to_string(),
            server_id: optional(6),
            map: optional(7),
            gamemode: optional(8),
            gamemode_id: parts.get(9).and_then(|s| s.parse().ok()),
            port_v4: parts.get(10).and_then(|s| s.parse().ok()),
            port_v6: parts.get(11).and_then(|s| s.parse().ok()),
        })
    }
}
