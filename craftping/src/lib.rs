#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
//! `craftping` is a client for the three Minecraft server discovery
//! protocols: the Java Edition Server List Ping, the UT3-derived Query
//! protocol, and the Bedrock Edition unconnected ping.
//!
//! Every protocol is available in a blocking flavour (the methods on
//! [`JavaServer`] and [`BedrockServer`]) and an async flavour built on the
//! tokio runtime (see [`tokio`]). Both share the packet framing in
//! [`connection`] and the response decoders, so they put identical bytes on
//! the wire.
//!
//! ```no_run
//! let server = craftping::JavaServer::lookup("mc.example.org")?;
//! let status = server.status()?;
//! println!("{}/{} players", status.players.online, status.players.max);
//! # Ok::<(), craftping::Error>(())
//! ```

pub mod address;
pub mod connection;
pub mod net;
pub mod retry;
pub mod tokio;

mod bedrock;
mod java;
mod query;

use std::time::Duration;

pub use bedrock::{
    BedrockEdition, BedrockPinger, BedrockResponse, BedrockServer, BedrockVersion,
    DEFAULT_PORT as DEFAULT_BEDROCK_PORT, OFFLINE_MESSAGE_DATA_ID,
};
pub use connection::{Buffer, Connection};
pub use java::{
    Chat, ForgeModInfoList, ForgeModMetadata, JavaServer, ModInfo, Player, Players,
    StatusPinger, StatusResponse, StatusState, TextComponent, Version,
    DEFAULT_PORT as DEFAULT_JAVA_PORT,
};
pub use query::{QueryPinger, QueryPlayers, QueryResponse, QueryState, Software};
pub use retry::Retry;

/// How long a single transport operation may take before it fails.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// How many attempts the client API makes before giving up.
pub const DEFAULT_TRIES: usize = 3;

/// Errors that can occur when talking to a server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("received an invalid packet: {0}")]
    InvalidPacket(String),
    #[error("server sent a varint that was too big")]
    VarIntTooLarge,
    #[error("VarInt was outside the range of a 32-bit signed integer")]
    InvalidVarInt(#[from] std::num::TryFromIntError),
    #[error("a JSON error occurred: {0}")]
    JsonErr(#[from] serde_json::Error),
    #[error("received an invalid status response: {0}")]
    InvalidStatus(String),
    #[error("tried to read {requested} bytes but only {available} were buffered")]
    Underflow { requested: usize, available: usize },
    #[error("the server closed the connection before responding")]
    ConnectionClosed,
    #[error("the operation timed out")]
    TimedOut,
    #[error("`{0}` is not supported on a socket connection")]
    Unsupported(&'static str),
    #[error("an invalid value was provided: {0}")]
    InvalidValue(String),
    #[error("cannot {operation} once the exchange is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    #[error("an invalid address was provided")]
    InvalidAddress,
    #[error("DNS lookup for the host provided failed")]
    DnsLookupFailed,
    #[error("an I/O error occurred: {0}")]
    IoError(std::io::Error),
}

/// The broad category an [`Error`] belongs to.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// The server sent something that does not follow the protocol.
    Protocol,
    /// The peer went away before a read could be satisfied.
    ConnectionClosed,
    /// An operation exceeded its deadline.
    Timeout,
    /// The caller supplied a value the protocol cannot carry.
    Validation,
    /// The operation only exists on in-memory buffers.
    Unsupported,
    /// Any other transport failure.
    Io,
}

impl Error {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPacket(_)
            | Self::VarIntTooLarge
            | Self::JsonErr(_)
            | Self::InvalidStatus(_)
            | Self::Underflow { .. } => ErrorKind::Protocol,
            Self::ConnectionClosed => ErrorKind::ConnectionClosed,
            Self::TimedOut => ErrorKind::Timeout,
            Self::InvalidVarInt(_)
            | Self::InvalidValue(_)
            | Self::InvalidState { .. }
            | Self::InvalidAddress => ErrorKind::Validation,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::DnsLookupFailed | Self::IoError(_) => ErrorKind::Io,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Kind;

        match err.kind() {
            Kind::TimedOut | Kind::WouldBlock => Self::TimedOut,
            Kind::UnexpectedEof => Self::ConnectionClosed,
            _ => Self::IoError(err),
        }
    }
}

impl From<::tokio::time::error::Elapsed> for Error {
    fn from(_: ::tokio::time::error::Elapsed) -> Self {
        Self::TimedOut
    }
}
