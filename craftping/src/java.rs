//! Implementation of the Java Minecraft ping protocol.
//! [Server List Ping](https://wiki.vg/Server_List_Ping)

use std::time::{Duration, Instant};

use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    DEFAULT_TIMEOUT, DEFAULT_TRIES, Error, QueryPinger, QueryResponse, address,
    connection::{Buffer, Connection},
    net::{TcpConnection, UdpConnection},
    retry::Retry,
};

/// The default port of a Java server.
pub const DEFAULT_PORT: u16 = 25565;

/// The protocol version sent in the handshake unless configured otherwise.
pub const DEFAULT_PROTOCOL_VERSION: i32 = 47;

const HANDSHAKE_PACKET_ID: i32 = 0;
const STATUS_PACKET_ID: i32 = 0;
const PING_PACKET_ID: i32 = 1;
const NEXT_STATE_STATUS: i32 = 1;

/// Configuration for talking to a Java server.
///
/// # Examples
///
/// ```
/// use craftping::JavaServer;
/// use std::time::Duration;
///
/// let server = JavaServer {
///     timeout: Duration::from_secs(10),
///     tries: 5,
///     ..JavaServer::new("mc.hypixel.net", 25565)
/// };
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct JavaServer {
    /// The host name or IP literal of the server.
    pub host: String,
    /// The port the server listens on. The query protocol uses the same port
    /// over UDP.
    pub port: u16,
    /// The timeout applied to connecting and to every read and write.
    pub timeout: Duration,
    /// How many attempts each operation gets.
    pub tries: usize,
    /// The protocol version announced in the handshake.
    pub protocol_version: i32,
}

impl JavaServer {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
            tries: DEFAULT_TRIES,
            protocol_version: DEFAULT_PROTOCOL_VERSION,
        }
    }

    /// Build a configuration from a `host[:port]` string.
    ///
    /// Without an explicit port the `_minecraft._tcp` SRV record is consulted,
    /// falling back to the default port if there is none.
    ///
    /// This drives its own small runtime for the DNS lookup, so it must not
    /// be called from within an async context; use
    /// [`JavaServer::lookup_async`] there.
    ///
    /// # Errors
    /// If the address cannot be parsed.
    pub fn lookup(address: &str) -> Result<Self, Error> {
        let (host, port) = address::parse_address(address)?;
        if let Some(port) = port {
            return Ok(Self::new(host, port));
        }
        Ok(match address::srv_lookup_blocking(&host) {
            Some((host, port)) => Self::new(host, port),
            None => Self::new(host, DEFAULT_PORT),
        })
    }

    fn retry(&self) -> Result<Retry, Error> {
        Retry::new(self.tries)
    }

    /// Measure the round trip latency in milliseconds.
    ///
    /// # Errors
    /// If every attempt fails; the error of the last attempt is returned.
    pub fn ping(&self) -> Result<f64, Error> {
        self.retry()?.run(|| {
            let mut connection = TcpConnection::connect(&self.host, self.port, self.timeout)?;
            let mut pinger = self.pinger(&mut connection);
            pinger.handshake()?;
            pinger.test_ping()
        })
    }

    /// Fetch the server status, including a latency measurement.
    ///
    /// # Errors
    /// If every attempt fails; the error of the last attempt is returned.
    pub fn status(&self) -> Result<StatusResponse, Error> {
        self.retry()?.run(|| {
            let mut connection = TcpConnection::connect(&self.host, self.port, self.timeout)?;
            let mut pinger = self.pinger(&mut connection);
            pinger.handshake()?;
            let mut status = pinger.read_status()?;
            status.latency = Some(pinger.test_ping()?);
            Ok(status)
        })
    }

    /// Fetch the full query statistics. The server must have `enable-query`
    /// turned on.
    ///
    /// # Errors
    /// If every attempt fails; the error of the last attempt is returned.
    pub fn query(&self) -> Result<QueryResponse, Error> {
        let ip = address::ip_lookup_blocking(&self.host)
            .map_or_else(|| self.host.clone(), |ip| ip.to_string());
        self.retry()?.run(|| {
            let mut connection = UdpConnection::connect(&ip, self.port, self.timeout)?;
            let mut querier = QueryPinger::new(&mut connection);
            querier.handshake()?;
            querier.read_query()
        })
    }

    pub(crate) fn pinger<'a, C>(&self, connection: &'a mut C) -> StatusPinger<'a, C> {
        StatusPinger::new(connection, &self.host, self.port).with_version(self.protocol_version)
    }
}

impl Default for JavaServer {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_PORT)
    }
}

/// Where a [`StatusPinger`] is in its exchange.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum StatusState {
    Init,
    Handshaken,
    StatusSent,
    StatusReceived,
    PingSent,
    PingReceived,
}

impl StatusState {
    const fn name(self) -> &'static str {
        match self {
            Self::Init => "not started",
            Self::Handshaken => "handshaken",
            Self::StatusSent => "waiting for a status",
            Self::StatusReceived => "finished reading the status",
            Self::PingSent => "waiting for a pong",
            Self::PingReceived => "finished pinging",
        }
    }

    /// Move to `next` if the exchange is currently in one of `from`.
    pub(crate) fn advance(
        &mut self,
        operation: &'static str,
        from: &[Self],
        next: Self,
    ) -> Result<(), Error> {
        if !from.contains(self) {
            return Err(Error::InvalidState {
                operation,
                state: self.name(),
            });
        }
        *self = next;
        Ok(())
    }
}

/// Drives the Server List Ping exchange over a borrowed connection.
///
/// One pinger handles one logical request: a handshake, then the status, a
/// latency measurement, or the status followed by a latency measurement.
#[derive(Debug)]
pub struct StatusPinger<'a, C> {
    connection: &'a mut C,
    host: String,
    port: u16,
    version: i32,
    token: i64,
    state: StatusState,
}

impl<'a, C> StatusPinger<'a, C> {
    /// A pinger with a fresh random ping token.
    pub fn new(connection: &'a mut C, host: &str, port: u16) -> Self {
        Self {
            connection,
            host: host.to_string(),
            port,
            version: DEFAULT_PROTOCOL_VERSION,
            token: rand::rng().random_range(0..i64::MAX),
            state: StatusState::Init,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Use a fixed ping token instead of a random one.
    #[must_use]
    pub fn with_token(mut self, token: i64) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub const fn token(&self) -> i64 {
        self.token
    }

    #[must_use]
    pub const fn state(&self) -> StatusState {
        self.state
    }

    pub(crate) fn connection(&mut self) -> &mut C {
        &mut *self.connection
    }

    pub(crate) fn begin_handshake(&mut self) -> Result<Buffer, Error> {
        self.state
            .advance("handshake", &[StatusState::Init], StatusState::Handshaken)?;
        handshake_packet(self.version, &self.host, self.port)
    }

    pub(crate) fn begin_status(&mut self) -> Result<Buffer, Error> {
        self.state.advance(
            "read the status",
            &[StatusState::Handshaken],
            StatusState::StatusSent,
        )?;
        status_request_packet()
    }

    pub(crate) fn finish_status(&mut self, response: Buffer) -> Result<StatusResponse, Error> {
        let status = decode_status(response)?;
        self.state = StatusState::StatusReceived;
        Ok(status)
    }

    pub(crate) fn begin_ping(&mut self) -> Result<Buffer, Error> {
        self.state.advance(
            "ping",
            &[StatusState::Handshaken, StatusState::StatusReceived],
            StatusState::PingSent,
        )?;
        ping_packet(self.token)
    }

    pub(crate) fn finish_ping(&mut self, response: Buffer, sent: Instant) -> Result<f64, Error> {
        let received = Instant::now();
        check_pong(response, self.token)?;
        self.state = StatusState::PingReceived;
        Ok(received.duration_since(sent).as_secs_f64() * 1000.0)
    }
}

impl<C: Connection> StatusPinger<'_, C> {
    /// Send the handshake announcing that a status request follows.
    ///
    /// # Errors
    /// If called twice, or the write fails.
    pub fn handshake(&mut self) -> Result<(), Error> {
        let mut packet = self.begin_handshake()?;
        self.connection.write_buffer(&mut packet)?;
        debug!(host = %self.host, port = self.port, version = self.version, "sent handshake");
        Ok(())
    }

    /// Request and decode the server status.
    ///
    /// # Errors
    /// If the server answers with anything but a well-formed status packet.
    pub fn read_status(&mut self) -> Result<StatusResponse, Error> {
        let mut request = self.begin_status()?;
        self.connection.write_buffer(&mut request)?;
        let response = self.connection.read_buffer()?;
        self.finish_status(response)
    }

    /// Send a ping and wait for the pong, returning the elapsed milliseconds.
    ///
    /// # Errors
    /// If the pong is malformed or echoes a different token.
    pub fn test_ping(&mut self) -> Result<f64, Error> {
        let mut request = self.begin_ping()?;
        let sent = Instant::now();
        self.connection.write_buffer(&mut request)?;
        let response = self.connection.read_buffer()?;
        self.finish_ping(response, sent)
    }
}

pub(crate) fn handshake_packet(version: i32, host: &str, port: u16) -> Result<Buffer, Error> {
    let mut packet = Buffer::new();
    packet.write_varint(HANDSHAKE_PACKET_ID.into())?;
    packet.write_varint(version.into())?;
    packet.write_utf(host)?;
    packet.write_ushort(port)?;
    packet.write_varint(NEXT_STATE_STATUS.into())?;
    Ok(packet)
}

pub(crate) fn status_request_packet() -> Result<Buffer, Error> {
    let mut packet = Buffer::new();
    packet.write_varint(STATUS_PACKET_ID.into())?;
    Ok(packet)
}

pub(crate) fn ping_packet(token: i64) -> Result<Buffer, Error> {
    let mut packet = Buffer::new();
    packet.write_varint(PING_PACKET_ID.into())?;
    packet.write_long(token)?;
    Ok(packet)
}

pub(crate) fn decode_status(mut response: Buffer) -> Result<StatusResponse, Error> {
    let id = response.read_varint()?;
    if id != STATUS_PACKET_ID {
        return Err(Error::InvalidPacket(format!(
            "expected a status response (id {STATUS_PACKET_ID}), got id {id}"
        )));
    }
    let raw: Value = serde_json::from_str(&response.read_utf()?)?;
    StatusResponse::from_value(raw)
}

pub(crate) fn check_pong(mut response: Buffer, token: i64) -> Result<(), Error> {
    let id = response.read_varint()?;
    if id != PING_PACKET_ID {
        return Err(Error::InvalidPacket(format!(
            "expected a pong (id {PING_PACKET_ID}), got id {id}"
        )));
    }
    let received = response.read_long()?;
    if received != token {
        return Err(Error::InvalidPacket(format!(
            "mangled pong (expected token {token}, received {received})"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct ForgeModMetadata {
    pub modid: String,
    pub version: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct ForgeModInfoList {
    #[serde(rename = "modList")]
    pub mod_list: Vec<ForgeModMetadata>,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ModInfo {
    #[serde(rename = "FML")]
    Fml(ForgeModInfoList),
}

/// The mandatory and well-known parts of a status document.
#[derive(Deserialize)]
struct StatusDocument {
    version: Version,
    players: Players,
    description: Chat,
    favicon: Option<String>,
    #[serde(rename = "enforcesSecureChat")]
    enforces_secure_chat: Option<bool>,
    #[serde(rename = "previewsChat")]
    previews_chat: Option<bool>,
}

/// The server status reponse
///
/// More information can be found [here](https://wiki.vg/Server_List_Ping).
#[derive(Debug, Clone, PartialEq)]
pub struct StatusResponse {
    /// The version of the server.
    pub version: Version,
    /// Information about online players
    pub players: Players,
    /// The description (MOTD) flattened to a string with `§` style codes.
    pub description: String,
    /// The description as the server sent it.
    pub chat: Chat,
    /// The server icon (a Base64-encoded PNG data URI)
    pub favicon: Option<String>,
    /// Forge mod information
    pub modinfo: Option<ModInfo>,
    /// Does this server enforce chat signing?
    pub enforces_secure_chat: Option<bool>,
    /// Does this server have chat previews?
    pub previews_chat: Option<bool>,
    /// Round trip latency in milliseconds, when it was measured.
    pub latency: Option<f64>,
    /// The full status document.
    pub raw: Value,
}

impl StatusResponse {
    /// Validate a decoded status document.
    ///
    /// # Errors
    /// If `version`, `players` or `description` is missing or mistyped.
    pub fn from_value(raw: Value) -> Result<Self, Error> {
        let document = StatusDocument::deserialize(&raw)
            .map_err(|e| Error::InvalidStatus(e.to_string()))?;
        let modinfo = raw
            .get("modinfo")
            .and_then(|v| ModInfo::deserialize(v).ok());

        Ok(Self {
            version: document.version,
            players: document.players,
            description: document.description.flatten(),
            chat: document.description,
            favicon: document.favicon,
            modinfo,
            enforces_secure_chat: document.enforces_secure_chat,
            previews_chat: document.previews_chat,
            latency: None,
            raw,
        })
    }
}

/// Information about the server's version
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct Version {
    /// The name of the version the server is running
    ///
    /// In practice this comes in a large variety of different formats.
    pub name: String,
    /// See [Protocol Version Numbers](https://wiki.vg/Protocol_version_numbers)
    pub protocol: i64,
}

/// An online player of the server.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct Player {
    /// The name of the player.
    pub name: String,
    /// The player's UUID
    pub id: String,
}

/// The stats for players on the server.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct Players {
    /// The max amount of players.
    pub max: i64,
    /// The amount of players online.
    pub online: i64,
    /// A preview of which players are online
    ///
    /// In practice servers often don't send this or use it for more advertising
    pub sample: Option<Vec<Player>>,
}

/// A Minecraft chat component, as used for the server description.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Chat {
    String(String),
    Component(TextComponent),
    List(Vec<Chat>),
    /// Anything else; flattens to nothing.
    Other(Value),
}

/// A styled span of text with optional children.
///
/// Style fields of the wrong type are tolerated so that one sloppy flag does
/// not cost the whole span its text.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TextComponent {
    pub text: String,
    pub extra: Vec<Chat>,
    #[serde(deserialize_with = "lenient_flag")]
    pub bold: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub italic: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub underlined: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub strikethrough: bool,
    #[serde(deserialize_with = "lenient_flag")]
    pub obfuscated: bool,
    #[serde(deserialize_with = "lenient_color")]
    pub color: Option<String>,
}

/// `true`, `"true"` and non-zero numbers are set; anything else is unset.
fn lenient_flag<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(set) => set,
        Value::String(text) => text.eq_ignore_ascii_case("true"),
        Value::Number(number) => number.as_f64().is_some_and(|n| n.abs() > f64::EPSILON),
        _ => false,
    })
}

fn lenient_color<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(color) => Some(color),
        _ => None,
    })
}

const COLOR_CODES: [(&str, char); 16] = [
    ("black", '0'),
    ("dark_blue", '1'),
    ("dark_green", '2'),
    ("dark_aqua", '3'),
    ("dark_red", '4'),
    ("dark_purple", '5'),
    ("gold", '6'),
    ("gray", '7'),
    ("dark_gray", '8'),
    ("blue", '9'),
    ("green", 'a'),
    ("aqua", 'b'),
    ("red", 'c'),
    ("light_purple", 'd'),
    ("yellow", 'e'),
    ("white", 'f'),
];

impl Chat {
    /// Flatten to a single string with inline `§` style codes.
    ///
    /// The spans in the root's `extra` list come first, in document order,
    /// followed by the root's own `text`. Root styling is not emitted.
    #[must_use]
    pub fn flatten(&self) -> String {
        let mut out = String::new();
        match self {
            Self::String(text) => out.push_str(text),
            Self::Component(root) => {
                for child in &root.extra {
                    child.write_styled(&mut out);
                }
                out.push_str(&root.text);
            }
            Self::List(children) => {
                for child in children {
                    child.write_styled(&mut out);
                }
            }
            Self::Other(_) => {}
        }
        out
    }

    fn write_styled(&self, out: &mut String) {
        match self {
            Self::String(text) => out.push_str(text),
            Self::Component(component) => component.write_styled(out),
            Self::List(children) => {
                for child in children {
                    child.write_styled(out);
                }
            }
            Self::Other(_) => {}
        }
    }
}

impl TextComponent {
    fn write_styled(&self, out: &mut String) {
        let flags = [
            (self.bold, 'l'),
            (self.italic, 'o'),
            (self.underlined, 'n'),
            (self.strikethrough, 'm'),
            (self.obfuscated, 'k'),
        ];
        for (_, code) in flags.iter().filter(|(set, _)| *set) {
            out.push('§');
            out.push(*code);
        }
        if let Some(code) = self.color.as_deref().and_then(color_code) {
            out.push('§');
            out.push(code);
        }
        out.push_str(&self.text);
        for child in &self.extra {
            child.write_styled(out);
        }
    }
}

fn color_code(name: &str) -> Option<char> {
    COLOR_CODES
        .iter()
        .find(|(color, _)| *color == name)
        .map(|(_, code)| *code)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    const STATUS_HEX: &str = "7200707B226465736372697074696F6E223A2241204D696E65637261667420536572766572222C22706C6179657273223A7B226D6178223A32302C226F6E6C696E65223A307D2C2276657273696F6E223A7B226E616D65223A22312E382D70726531222C2270726F746F636F6C223A34347D7D";

    fn handshaken(buffer: &mut Buffer) -> StatusPinger<'_, Buffer> {
        let mut pinger = StatusPinger::new(buffer, "localhost", 25565).with_version(44);
        pinger.handshake().unwrap();
        pinger
    }

    #[test]
    fn handshake_bytes() {
        let mut buffer = Buffer::new();
        let pinger = handshaken(&mut buffer);
        assert_eq!(pinger.state(), StatusState::Handshaken);
        drop(pinger);
        assert_eq!(
            buffer.flush().unwrap(),
            hex("0F002C096C6F63616C686F737463DD01")
        );
    }

    #[test]
    fn read_status() {
        let mut buffer = Buffer::from(&hex(STATUS_HEX)[..]);
        let mut pinger = handshaken(&mut buffer);
        let status = pinger.read_status().unwrap();
        assert_eq!(pinger.state(), StatusState::StatusReceived);
        drop(pinger);

        assert_eq!(status.players.max, 20);
        assert_eq!(status.players.online, 0);
        assert_eq!(status.version.protocol, 44);
        assert_eq!(status.version.name, "1.8-pre1");
        assert_eq!(status.description, "A Minecraft Server");
        assert_eq!(status.favicon, None);
        assert_eq!(
            status.raw,
            json!({
                "description": "A Minecraft Server",
                "players": {"max": 20, "online": 0},
                "version": {"name": "1.8-pre1", "protocol": 44},
            })
        );

        let sent = buffer.flush().unwrap();
        assert_eq!(&sent[sent.len() - 2..], hex("0100"));
    }

    #[test]
    fn read_status_invalid_json() {
        let mut buffer = Buffer::from(&hex("0300017B")[..]);
        let err = handshaken(&mut buffer).read_status().unwrap_err();
        assert!(matches!(err, Error::JsonErr(_)), "{err:?}");
    }

    #[test]
    fn read_status_missing_description() {
        let mut buffer = Buffer::from(&hex("4F004D7B22706C6179657273223A7B226D6178223A32302C226F6E6C696E65223A307D2C2276657273696F6E223A7B226E616D65223A22312E382D70726531222C2270726F746F636F6C223A34347D7D")[..]);
        let err = handshaken(&mut buffer).read_status().unwrap_err();
        assert!(matches!(err, Error::InvalidStatus(_)), "{err:?}");
        assert_eq!(err.kind(), crate::ErrorKind::Protocol);
    }

    #[test]
    fn read_status_wrong_packet_id() {
        let mut buffer = Buffer::from(&hex("0105")[..]);
        let err = handshaken(&mut buffer).read_status().unwrap_err();
        assert!(matches!(err, Error::InvalidPacket(_)), "{err:?}");
    }

    #[test]
    fn read_status_before_handshake() {
        let mut buffer = Buffer::from(&hex(STATUS_HEX)[..]);
        let mut pinger = StatusPinger::new(&mut buffer, "localhost", 25565);
        let err = pinger.read_status().unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        assert_eq!(pinger.state(), StatusState::Init);
    }

    #[test]
    fn test_ping() {
        let mut buffer = Buffer::from(&hex("09010000000000DD7D1C")[..]);
        let mut pinger = handshaken(&mut buffer).with_token(14_515_484);
        assert!(pinger.test_ping().unwrap() >= 0.0);
        assert_eq!(pinger.state(), StatusState::PingReceived);
        drop(pinger);

        let sent = buffer.flush().unwrap();
        assert_eq!(&sent[16..], hex("09010000000000DD7D1C"));
    }

    #[test]
    fn test_ping_wrong_packet_id() {
        let mut buffer = Buffer::from(&hex("011F")[..]);
        let mut pinger = handshaken(&mut buffer).with_token(14_515_484);
        assert!(matches!(pinger.test_ping(), Err(Error::InvalidPacket(_))));
    }

    #[test]
    fn test_ping_wrong_token() {
        let mut buffer = Buffer::from(&hex("09010000000000DD7D1C")[..]);
        let mut pinger = handshaken(&mut buffer).with_token(12345);
        let err = pinger.test_ping().unwrap_err();
        assert!(err.to_string().contains("expected token 12345"), "{err}");
        assert_eq!(pinger.state(), StatusState::PingSent);
    }

    #[test]
    fn status_then_ping() {
        let mut data = hex(STATUS_HEX);
        data.extend(hex("09010000000000DD7D1C"));
        let mut buffer = Buffer::from(&data[..]);
        let mut pinger = handshaken(&mut buffer).with_token(14_515_484);
        pinger.read_status().unwrap();
        pinger.test_ping().unwrap();
        assert!(matches!(pinger.test_ping(), Err(Error::InvalidState { .. })));
    }

    #[test]
    fn random_tokens_are_positive() {
        let mut buffer = Buffer::new();
        for _ in 0..32 {
            assert!(StatusPinger::new(&mut buffer, "h", 1).token() >= 0);
        }
    }

    fn status_json(extra: Value) -> Value {
        let mut base = json!({
            "description": "A Minecraft Server",
            "players": {"max": 20, "online": 0},
            "version": {"name": "1.8-pre1", "protocol": 44},
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        base
    }

    #[test]
    fn mandatory_fields() {
        for key in ["players", "version", "description"] {
            let mut raw = status_json(json!({}));
            raw.as_object_mut().unwrap().remove(key);
            let err = StatusResponse::from_value(raw).unwrap_err();
            assert!(err.to_string().contains(key), "{err}");
        }
    }

    #[test]
    fn mistyped_fields() {
        let cases = [
            json!({"version": "foo"}),
            json!({"version": {"name": "foo", "protocol": "bar"}}),
            json!({"version": {"protocol": 5}}),
            json!({"players": {"max": "foo", "online": 5}}),
            json!({"players": {"max": 20}}),
            json!({"players": {"max": 20, "online": 1, "sample": "foo"}}),
            json!({"players": {"max": 20, "online": 1, "sample": [{"name": "Dinnerbone"}]}}),
            json!({"players": {"max": 20, "online": 1, "sample": [{"name": {}, "id": "x"}]}}),
        ];
        for case in cases {
            assert!(
                StatusResponse::from_value(status_json(case.clone())).is_err(),
                "{case}"
            );
        }
    }

    #[test]
    fn optional_fields() {
        let status = StatusResponse::from_value(status_json(json!({
            "favicon": "data:image/png;base64,foo",
            "players": {"max": 20, "online": 1, "sample": [
                {"name": "Dinnerbone", "id": "61699b2e-d327-4a01-9f1e-0ea8c3f06bc6"}
            ]},
            "enforcesSecureChat": true,
            "modinfo": {"type": "FML", "modList": [{"modid": "forge", "version": "14.23"}]},
        })))
        .unwrap();
        assert_eq!(status.favicon.as_deref(), Some("data:image/png;base64,foo"));
        let sample = status.players.sample.unwrap();
        assert_eq!(sample[0].name, "Dinnerbone");
        assert_eq!(status.enforces_secure_chat, Some(true));
        assert_eq!(status.previews_chat, None);
        let Some(ModInfo::Fml(mods)) = status.modinfo else {
            panic!("expected forge mod info");
        };
        assert_eq!(mods.mod_list[0].modid, "forge");
    }

    #[test]
    fn unknown_modinfo_is_ignored() {
        let status = StatusResponse::from_value(status_json(json!({
            "modinfo": {"type": "BUKKIT"},
        })))
        .unwrap();
        assert_eq!(status.modinfo, None);
    }

    #[test]
    fn description_component() {
        let status = StatusResponse::from_value(status_json(json!({
            "description": {"text": "A Minecraft Server"},
        })))
        .unwrap();
        assert_eq!(status.description, "A Minecraft Server");
    }

    #[test]
    fn description_styles_are_flattened() {
        let chat: Chat = serde_json::from_value(json!({
            "extra": [
                {"bold": true, "italic": true, "color": "gray", "text": "foo"},
                {"color": "gold", "text": "bar"},
                {"strikethrough": true, "underlined": true, "obfuscated": true, "text": "!"},
                {"color": "#ff00ff", "text": "hex"},
                "plain",
            ],
            "text": "baz",
        }))
        .unwrap();
        assert_eq!(chat.flatten(), "§l§o§7foo§6bar§n§m§k!hexplainbaz");
    }

    #[test]
    fn description_nested_and_list() {
        let chat: Chat = serde_json::from_value(json!([
            {"text": "a", "color": "red", "extra": [{"text": "b", "bold": true}]},
            "c",
        ]))
        .unwrap();
        assert_eq!(chat.flatten(), "§ca§lbc");
    }

    #[test]
    fn mistyped_styles_keep_their_text() {
        let chat: Chat = serde_json::from_value(json!({
            "extra": [
                {"text": "a", "bold": "true", "italic": 1},
                {"text": "b", "underlined": "yes", "color": 5},
                {"text": "c", "obfuscated": null},
            ],
            "text": "",
        }))
        .unwrap();
        assert!(matches!(chat, Chat::Component(_)));
        assert_eq!(chat.flatten(), "§l§oabc");
    }

    #[test]
    fn odd_description_does_not_fail() {
        let status = StatusResponse::from_value(status_json(json!({"description": 42}))).unwrap();
        assert_eq!(status.description, "");
    }
}
