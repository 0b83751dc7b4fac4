//! Implementation of the UT3/GameSpot query protocol.
//! [Query](https://wiki.vg/Query)

use std::collections::HashMap;

use rand::Rng;
use tracing::debug;

use crate::{
    Error,
    connection::{Buffer, Connection},
};

/// Every query request starts with these two bytes.
pub const MAGIC_PREFIX: [u8; 2] = [0xFE, 0xFD];

const PACKET_TYPE_CHALLENGE: u8 = 9;
const PACKET_TYPE_QUERY: u8 = 0;

/// Asks for the full stat response rather than the basic one.
const FULL_STAT_PADDING: [u8; 4] = [0; 4];

/// The server only looks at the lower nibble of each session id byte.
const SESSION_ID_MASK: u32 = 0x0F0F_0F0F;

/// Packet type plus echoed session id.
const RESPONSE_HEADER_LEN: usize = 1 + 4;

/// `splitnum\0` followed by `0x80 0x00`.
const KEY_VALUE_PREAMBLE_LEN: usize = "splitnum".len() + 1 + 1 + 1;

/// `\x01player_\0\0`; the leading byte is consumed with the empty key.
const PLAYER_PREAMBLE_LEN: usize = "player_".len() + 1 + 1;

/// Where a [`QueryPinger`] is in its exchange.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum QueryState {
    Init,
    Challenged,
    Queried,
}

/// Drives the query challenge and full stat request over a borrowed
/// datagram connection.
#[derive(Debug)]
pub struct QueryPinger<'a, C> {
    connection: &'a mut C,
    session_id: u32,
    challenge: i32,
    state: QueryState,
}

impl<'a, C> QueryPinger<'a, C> {
    /// A querier with a random session id.
    pub fn new(connection: &'a mut C) -> Self {
        Self {
            connection,
            session_id: rand::rng().random::<u32>() & SESSION_ID_MASK,
            challenge: 0,
            state: QueryState::Init,
        }
    }

    /// Use a fixed session id. Bits the protocol cannot carry are masked off.
    #[must_use]
    pub fn with_session_id(mut self, session_id: u32) -> Self {
        self.session_id = session_id & SESSION_ID_MASK;
        self
    }

    #[must_use]
    pub const fn session_id(&self) -> u32 {
        self.session_id
    }

    /// The challenge token from the handshake, `0` before it completed.
    #[must_use]
    pub const fn challenge(&self) -> i32 {
        self.challenge
    }

    #[must_use]
    pub const fn state(&self) -> QueryState {
        self.state
    }

    pub(crate) fn connection(&mut self) -> &mut C {
        &mut *self.connection
    }

    fn expect_state(&self, operation: &'static str, expected: QueryState) -> Result<(), Error> {
        if self.state == expected {
            return Ok(());
        }
        Err(Error::InvalidState {
            operation,
            state: match self.state {
                QueryState::Init => "not started",
                QueryState::Challenged => "challenged",
                QueryState::Queried => "finished querying",
            },
        })
    }

    pub(crate) fn begin_handshake(&self) -> Result<Vec<u8>, Error> {
        self.expect_state("handshake", QueryState::Init)?;
        let mut packet = Buffer::new();
        packet.write(&MAGIC_PREFIX)?;
        packet.write(&[PACKET_TYPE_CHALLENGE])?;
        packet.write_uint(self.session_id)?;
        packet.flush()
    }

    pub(crate) fn finish_handshake(&mut self, datagram: &[u8]) -> Result<(), Error> {
        self.challenge = parse_challenge(datagram)?;
        self.state = QueryState::Challenged;
        debug!(challenge = self.challenge, "received query challenge");
        Ok(())
    }

    pub(crate) fn begin_query(&self) -> Result<Vec<u8>, Error> {
        self.expect_state("query", QueryState::Challenged)?;
        let mut packet = Buffer::new();
        packet.write(&MAGIC_PREFIX)?;
        packet.write(&[PACKET_TYPE_QUERY])?;
        packet.write_uint(self.session_id)?;
        packet.write_int(self.challenge)?;
        packet.write(&FULL_STAT_PADDING)?;
        packet.flush()
    }

    pub(crate) fn finish_query(&mut self, datagram: &[u8]) -> Result<QueryResponse, Error> {
        let response = parse_query(datagram)?;
        self.state = QueryState::Queried;
        Ok(response)
    }
}

impl<C: Connection> QueryPinger<'_, C> {
    /// Obtain the challenge token that authorizes the stat request.
    ///
    /// # Errors
    /// If the server does not answer with a numeric challenge.
    pub fn handshake(&mut self) -> Result<(), Error> {
        let request = self.begin_handshake()?;
        self.connection.write(&request)?;
        let datagram = self.connection.read_datagram()?;
        self.finish_handshake(&datagram)
    }

    /// Request and decode the full stat response.
    ///
    /// # Errors
    /// If called before the handshake, or the response is malformed.
    pub fn read_query(&mut self) -> Result<QueryResponse, Error> {
        let request = self.begin_query()?;
        self.connection.write(&request)?;
        let datagram = self.connection.read_datagram()?;
        self.finish_query(&datagram)
    }
}

fn parse_challenge(datagram: &[u8]) -> Result<i32, Error> {
    let mut packet = Buffer::from(datagram);
    packet.skip(RESPONSE_HEADER_LEN)?;
    let text = packet.read_ascii()?;
    // Servers print the token as a signed decimal, but some overflow into the
    // unsigned range. Either way only the 32 bits go back on the wire.
    text.trim()
        .parse::<i32>()
        .or_else(|_| text.trim().parse::<u32>().map(|v| i32::from_be_bytes(v.to_be_bytes())))
        .map_err(|_| Error::InvalidPacket(format!("challenge `{text}` is not a number")))
}

fn parse_query(datagram: &[u8]) -> Result<QueryResponse, Error> {
    let mut packet = Buffer::from(datagram);
    packet.skip(RESPONSE_HEADER_LEN)?;
    packet.skip(KEY_VALUE_PREAMBLE_LEN)?;

    let mut raw = HashMap::new();
    loop {
        let key = packet.read_ascii()?;
        if key.is_empty() {
            packet.skip(1)?;
            break;
        }
        let value = packet.read_ascii()?;
        raw.insert(key, value);
    }

    packet.skip(PLAYER_PREAMBLE_LEN)?;

    let mut names = Vec::new();
    loop {
        let name = packet.read_ascii()?;
        if name.is_empty() {
            break;
        }
        names.push(name);
    }

    QueryResponse::from_raw(raw, names)
}

/// Full stat response of the query protocol.
///
/// Strings are decoded byte-for-byte as Latin-1. Servers actually send
/// whatever bytes their MOTD holds, usually UTF-8, so non-ASCII text shows
/// up garbled here while the Server List Ping gets it right. Use
/// [`QueryResponse::motd_bytes`] to get the original bytes back.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct QueryResponse {
    /// Every key/value pair the server sent.
    pub raw: HashMap<String, String>,
    /// The `hostname` field.
    pub motd: String,
    /// The `map` field, the name of the main world.
    pub map: String,
    pub players: QueryPlayers,
    pub software: Software,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct QueryPlayers {
    pub online: i64,
    pub max: i64,
    /// Names of every online player.
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Software {
    /// The game version, e.g. `1.8`.
    pub version: String,
    /// `vanilla` unless the server reports a modded brand.
    pub brand: String,
    pub plugins: Vec<String>,
}

impl Software {
    /// Derive the brand and plugin list from the raw `plugins` field, which
    /// looks like `Brand: Plugin 1.0; Other 2.0`.
    #[must_use]
    pub fn new(version: &str, plugins: &str) -> Self {
        let (brand, plugins) = if plugins.is_empty() {
            ("vanilla".to_string(), Vec::new())
        } else {
            match plugins.split_once(':') {
                Some((brand, list)) => (
                    brand.trim().to_string(),
                    list.split(';')
                        .map(str::trim)
                        .filter(|plugin| !plugin.is_empty())
                        .map(ToString::to_string)
                        .collect(),
                ),
                None => (plugins.trim().to_string(), Vec::new()),
            }
        };
        Self {
            version: version.to_string(),
            brand,
            plugins,
        }
    }
}

impl QueryResponse {
    /// Build a response from the raw key/value pairs and player names.
    ///
    /// # Errors
    /// If `hostname`, `map`, `numplayers`, `maxplayers` or `version` is
    /// missing, or a player count is not a number.
    pub fn from_raw(raw: HashMap<String, String>, names: Vec<String>) -> Result<Self, Error> {
        let field = |key: &str| {
            raw.get(key)
                .ok_or_else(|| Error::InvalidPacket(format!("query response has no `{key}`")))
        };
        let count = |key: &str| {
            field(key)?.trim().parse::<i64>().map_err(|_| {
                Error::InvalidPacket(format!("query response `{key}` is not a number"))
            })
        };

        let motd = field("hostname")?.clone();
        let map = field("map")?.clone();
        let players = QueryPlayers {
            online: count("numplayers")?,
            max: count("maxplayers")?,
            names,
        };
        let plugins = raw.get("plugins").map_or("", String::as_str);
        let software = Software::new(field("version")?, plugins);

        Ok(Self {
            motd,
            map,
            players,
            software,
            raw,
        })
    }

    /// The MOTD as the bytes the server sent.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn motd_bytes(&self) -> Vec<u8> {
        self.motd.chars().map(|c| u32::from(c) as u8).collect()
    }
}
