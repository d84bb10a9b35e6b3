//! TCP acceptor.
//!
//! Accepting is async so the server can race it against shutdown and the
//! tick timer. Each accepted socket is converted to a blocking
//! [`std::net::TcpStream`] and handed to [`Connection::open`], which gives
//! it a reader thread of its own.
//!
//! [`Connection::open`]: crate::Connection::open

use std::net::{SocketAddr, TcpStream};

use tokio::net::TcpListener;

use crate::TransportError;

/// Listens for incoming client sockets.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Binds to `addr`. Port `0` picks a free port; see [`local_addr`].
    ///
    /// [`local_addr`]: Self::local_addr
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let inner = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "listening");
        Ok(Self { inner })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.inner.local_addr().map_err(TransportError::AcceptFailed)
    }

    /// Waits for the next client and returns its socket, detached from the
    /// Tokio reactor.
    ///
    /// The returned socket may still be in non-blocking mode;
    /// [`Connection::open`](crate::Connection::open) resets it.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), TransportError> {
        let (stream, addr) = self
            .inner
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let stream = stream.into_std().map_err(TransportError::AcceptFailed)?;
        tracing::debug!(%addr, "accepted socket");
        Ok((stream, addr))
    }
}
