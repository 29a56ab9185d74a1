//! TCP server: accept loop and connection lifecycle.

pub mod auth;
pub mod connection;
pub mod dispatcher;
pub mod registry;

pub use auth::{Authenticator, MemoryAuthenticator};
pub use connection::{ConnectionContext, ConnectionId};
pub use dispatcher::{Dispatcher, DEFAULT_WORKERS};
pub use registry::{CommandHandler, CommandRegistry};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

/// Bound listener plus the shared dispatcher. `bind` and `run` are separate
/// so callers (and tests) can bind port 0 and learn the real address before
/// accepting.
pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    pub async fn bind(addr: SocketAddr, dispatcher: Arc<Dispatcher>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            dispatcher,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept until cancelled. Each connection runs as its own task; nothing
    /// request-related ever executes inline in this loop.
    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!(addr = %self.listener.local_addr()?, "server listening");
        let mut next_id: ConnectionId = 0;
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    // Transient accept failures (EMFILE, aborted handshake)
                    // must not kill the listener.
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(%peer, error = %e, "set_nodelay failed");
            }
            let id = next_id;
            next_id += 1;
            tokio::spawn(connection::handle_connection(
                stream,
                peer,
                id,
                self.dispatcher.clone(),
            ));
        }
    }
}
