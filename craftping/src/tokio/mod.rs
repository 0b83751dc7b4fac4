//! The async flavour of the client, running on tokio.
//!
//! The protocol state machines are the same ones the blocking API drives;
//! only the transport underneath is awaited.
//!
//! ```no_run
//! # async {
//! let server = craftping::JavaServer::lookup_async("mc.hypixel.net").await?;
//! let status = server.status_async().await?;
//! println!("{}", status.description);
//! # Ok::<(), craftping::Error>(())
//! # };
//! ```

mod bedrock;
mod java;
pub mod net;
mod query;

use std::{future::Future, sync::OnceLock};

use hickory_resolver::{
    Resolver, TokioResolver,
    config::{ResolverConfig, ResolverOpts},
    name_server::TokioConnectionProvider,
};

use crate::{
    Error,
    connection::{Buffer, Connection, MAX_DATAGRAM_SIZE, VarIntDecoder, checked_length, frame},
};

pub use bedrock::AsyncBedrockPinger;
pub use java::AsyncStatusPinger;
pub use query::AsyncQueryPinger;

/// The async counterpart of [`Connection`]: a byte pipe whose reads and
/// writes are awaited.
pub trait AsyncConnection: Send {
    /// Read exactly `length` bytes, or one whole datagram for datagram
    /// transports.
    fn read(&mut self, length: usize) -> impl Future<Output = Result<Vec<u8>, Error>> + Send;

    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<(), Error>> + Send;

    /// Read one complete datagram.
    fn read_datagram(&mut self) -> impl Future<Output = Result<Vec<u8>, Error>> + Send {
        self.read(MAX_DATAGRAM_SIZE)
    }

    fn read_varint(&mut self) -> impl Future<Output = Result<i32, Error>> + Send {
        async move {
            let mut decoder = VarIntDecoder::default();
            loop {
                let byte = self
                    .read(1)
                    .await?
                    .first()
                    .copied()
                    .ok_or(Error::ConnectionClosed)?;
                if let Some(value) = decoder.push(byte)? {
                    return Ok(value);
                }
            }
        }
    }

    /// Reads a varint-length-prefixed packet into its own [`Buffer`].
    fn read_buffer(&mut self) -> impl Future<Output = Result<Buffer, Error>> + Send {
        async move {
            let length = checked_length(self.read_varint().await?, "packet")?;
            let data = self.read(length).await?;
            Ok(Buffer::from(data.as_slice()))
        }
    }

    /// Flushes `packet` and writes it with a varint length prefix, as a single
    /// write.
    fn write_buffer(
        &mut self,
        packet: &mut Buffer,
    ) -> impl Future<Output = Result<(), Error>> + Send {
        let framed = frame(packet);
        async move {
            let framed = framed?;
            self.write(&framed).await
        }
    }
}

impl AsyncConnection for Buffer {
    async fn read(&mut self, length: usize) -> Result<Vec<u8>, Error> {
        Connection::read(self, length)
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        Connection::write(self, data)
    }

    async fn read_datagram(&mut self) -> Result<Vec<u8>, Error> {
        Connection::read_datagram(self)
    }
}

/// A resolver using Cloudflare's public servers.
pub(crate) fn new_resolver() -> TokioResolver {
    let mut opts = ResolverOpts::default();
    opts.cache_size = 64;
    opts.attempts = 3;
    Resolver::builder_with_config(
        ResolverConfig::cloudflare(),
        TokioConnectionProvider::default(),
    )
    .with_options(opts)
    .build()
}

/// The process wide resolver used by the async lookups.
pub fn resolver() -> &'static TokioResolver {
    static RESOLVER: OnceLock<TokioResolver> = OnceLock::new();
    RESOLVER.get_or_init(new_resolver)
}
