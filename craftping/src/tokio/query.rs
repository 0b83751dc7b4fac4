use super::AsyncConnection;
use crate::{Error, QueryPinger, QueryResponse, QueryState};

/// The async form of [`QueryPinger`].
#[derive(Debug)]
pub struct AsyncQueryPinger<'a, C> {
    inner: QueryPinger<'a, C>,
}

impl<'a, C> AsyncQueryPinger<'a, C> {
    pub fn new(connection: &'a mut C) -> Self {
        Self {
            inner: QueryPinger::new(connection),
        }
    }

    #[must_use]
    pub fn with_session_id(self, session_id: u32) -> Self {
        Self {
            inner: self.inner.with_session_id(session_id),
        }
    }

    #[must_use]
    pub const fn session_id(&self) -> u32 {
        self.inner.session_id()
    }

    #[must_use]
    pub const fn challenge(&self) -> i32 {
        self.inner.challenge()
    }

    #[must_use]
    pub const fn state(&self) -> QueryState {
        self.inner.state()
    }
}

impl<C: AsyncConnection> AsyncQueryPinger<'_, C> {
    /// # Errors
    /// If the server does not answer with a numeric challenge.
    pub async fn handshake(&mut self) -> Result<(), Error> {
        let request = self.inner.begin_handshake()?;
        let connection = self.inner.connection();
        connection.write(&request).await?;
        let datagram = connection.read_datagram().await?;
        self.inner.finish_handshake(&datagram)
    }

    /// # Errors
    /// If called before the handshake, or the response is malformed.
    pub async fn read_query(&mut self) -> Result<QueryResponse, Error> {
        let request = self.inner.begin_query()?;
        let connection = self.inner.connection();
        connection.write(&request).await?;
        let datagram = connection.read_datagram().await?;
        self.inner.finish_query(&datagram)
    }
}
