//! TCP listener that strips PROXY headers from accepted connections.
//!
//! Accepting and classifying are split: a background task accepts sockets
//! and classifies each one on its own task, and classified streams are
//! queued for [`ProxyListener::accept`] in completion order.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use super::error::ProxyError;
use super::stream::{ProxiedStream, ProxySettings, TransportAddrs};

/// Classified connections waiting for `accept`
const ACCEPT_BACKLOG: usize = 128;

/// A TCP listener whose connections come out as [`ProxiedStream`]s.
pub struct ProxyListener {
    local_addr: SocketAddr,
    incoming: mpsc::Receiver<ProxiedStream<TcpStream>>,
    accept_task: JoinHandle<()>,
}

impl ProxyListener {
    pub async fn bind(addr: SocketAddr, settings: ProxySettings) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(bind_addr = %listener.local_addr()?, "PROXY listener bound");
        Self::from_listener(listener, settings)
    }

    /// Take over `listener`. Must be called from within a tokio runtime.
    pub fn from_listener(listener: TcpListener, settings: ProxySettings) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let (tx, incoming) = mpsc::channel(ACCEPT_BACKLOG);
        let accept_task = tokio::spawn(accept_loop(listener, settings, tx));
        Ok(Self {
            local_addr,
            incoming,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Next classified connection.
    ///
    /// Connections are returned as soon as their own classification finishes,
    /// so a client that is slow to send its header does not hold up the ones
    /// behind it. Connections rejected by the failure policy are logged and
    /// never returned.
    pub async fn accept(&mut self) -> io::Result<ProxiedStream<TcpStream>> {
        self.incoming
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "accept loop stopped"))
    }

    /// Hand every classified connection to `handler` on its own task.
    pub async fn serve<F, Fut>(mut self, handler: F) -> io::Result<()>
    where
        F: Fn(ProxiedStream<TcpStream>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler = Arc::new(handler);
        loop {
            let stream = self.accept().await?;
            let handler = Arc::clone(&handler);
            let span = tracing::info_span!("connection", peer = ?stream.peer_addr());
            tokio::spawn(async move { handler(stream).await }.instrument(span));
        }
    }
}

impl Drop for ProxyListener {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    settings: ProxySettings,
    tx: mpsc::Sender<ProxiedStream<TcpStream>>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let settings = settings.clone();
                let tx = tx.clone();
                tokio::spawn(
                    async move {
                        match wrap(stream, peer, &settings).await {
                            Ok(stream) => {
                                if tx.send(stream).await.is_err() {
                                    debug!("listener closed before connection was taken");
                                }
                            }
                            Err(e) => warn!(error = %e, "connection dropped"),
                        }
                    }
                    .instrument(tracing::info_span!("classify", peer = %peer)),
                );
            }
            Err(e) => {
                error!(error = %e, "accept error");
                // Brief sleep to avoid tight loop on persistent errors
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn wrap(
    stream: TcpStream,
    peer: SocketAddr,
    settings: &ProxySettings,
) -> Result<ProxiedStream<TcpStream>, ProxyError> {
    let local = stream.local_addr()?;
    ProxiedStream::accept(stream, TransportAddrs::new(local, peer), settings).await
}
