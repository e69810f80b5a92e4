//! TCP login server.
//!
//! Every accepted connection runs one challenge/login/response exchange in its
//! own task. The registry and the metrics are the only state shared between
//! tasks.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::protocol::handshake::{HandshakeState, LoginOutcome, ServerHandshake};
use crate::protocol::registry::PlayerRegistry;
use crate::utils::metrics::Metrics;
use crate::utils::timeout::with_timeout_error;

/// Interval at which a shutting-down server checks for open connections
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bound listener plus the state shared by all connections
pub struct Server {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    registry: Arc<PlayerRegistry>,
    metrics: Arc<Metrics>,
}

impl Server {
    /// Bind the configured address with an empty registry
    #[instrument(skip(config), fields(address = %config.address))]
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        Self::bind_with_registry(config, Arc::new(PlayerRegistry::new())).await
    }

    /// Bind the configured address, sharing an existing registry
    pub async fn bind_with_registry(
        config: ServerConfig,
        registry: Arc<PlayerRegistry>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_address()).await?;
        info!(address = %listener.local_addr()?, "Login server listening");

        Ok(Self {
            listener,
            config: Arc::new(config),
            registry,
            metrics: Arc::new(Metrics::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<PlayerRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Serve until CTRL+C
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        forward_signal(tokio::signal::ctrl_c(), shutdown_tx.clone());

        // Held until the server stops so a failed listener cannot close the channel
        let result = self.run_with_shutdown(shutdown_rx).await;
        drop(shutdown_tx);
        result
    }

    /// Serve until a message arrives on `shutdown_rx` or its sender is dropped.
    ///
    /// After the signal no new connections are accepted; open ones get up to
    /// `shutdown_timeout` to finish.
    pub async fn run_with_shutdown(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down server. Waiting for connections to close...");
                    self.drain().await;
                    self.metrics.log_metrics();
                    return Ok(());
                }

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            let config = Arc::clone(&self.config);
                            let registry = Arc::clone(&self.registry);
                            let metrics = Arc::clone(&self.metrics);

                            metrics.connection_opened();
                            tokio::spawn(async move {
                                let _ =
                                    handle_connection(stream, peer, &config, &registry, &metrics)
                                        .await;
                                metrics.connection_closed();
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Error accepting connection");
                        }
                    }
                }
            }
        }
    }

    async fn drain(&self) {
        let timeout = tokio::time::sleep(self.config.shutdown_timeout);
        tokio::pin!(timeout);

        loop {
            let connections = self.metrics.snapshot().connections_active;
            if connections == 0 {
                info!("All connections closed, shutting down");
                return;
            }
            debug!(connections, "Waiting for connections to close");

            tokio::select! {
                _ = &mut timeout => {
                    warn!(connections, "Shutdown timeout reached, forcing exit");
                    return;
                }
                _ = tokio::time::sleep(DRAIN_POLL_INTERVAL) => {}
            }
        }
    }
}

/// Send on `shutdown_tx` once `signal` resolves successfully
fn forward_signal<F>(signal: F, shutdown_tx: mpsc::Sender<()>) -> JoinHandle<()>
where
    F: Future<Output = io::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                info!("Received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => error!(error = %e, "Cannot listen for CTRL+C, serving until stopped"),
        }
    })
}

/// Run one login exchange on `stream` and close it.
///
/// The stream is shut down on every path. Errors are logged and counted here;
/// the returned value is for callers that want the outcome.
#[instrument(skip_all, fields(peer = %peer))]
pub async fn handle_connection<S>(
    mut stream: S,
    peer: SocketAddr,
    config: &ServerConfig,
    registry: &PlayerRegistry,
    metrics: &Metrics,
) -> Result<LoginOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut handshake = ServerHandshake::new();
    let result = exchange(&mut stream, &mut handshake, config, registry, metrics).await;

    handshake.close();
    let _ = stream.shutdown().await;

    match &result {
        Ok(outcome) if outcome.is_accepted() => metrics.login_accepted(),
        Ok(_) => metrics.login_rejected(),
        Err(ProtocolError::Timeout) => {
            metrics.timeout();
            debug!("Connection timed out");
        }
        Err(e) if e.is_disconnect() => debug!(error = %e, "Client disconnected"),
        Err(e) => {
            metrics.connection_error();
            error!(error = %e, "Login connection failed");
        }
    }

    result
}

async fn exchange<S>(
    stream: &mut S,
    handshake: &mut ServerHandshake,
    config: &ServerConfig,
    registry: &PlayerRegistry,
    metrics: &Metrics,
) -> Result<LoginOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_packet(stream, &handshake.challenge_packet(), config.write_timeout, metrics).await?;
    handshake.advance(HandshakeState::ChallengeSent)?;
    debug!(challenge = handshake.challenge(), "Challenge sent");

    handshake.advance(HandshakeState::AwaitingLoginRead)?;
    let mut buf = vec![0u8; config.max_packet_size];
    let read = with_timeout_error(
        async { stream.read(&mut buf).await.map_err(ProtocolError::from) },
        config.read_timeout,
    )
    .await?;
    if read == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    metrics.packet_received(read as u64);
    debug!(data = %String::from_utf8_lossy(&buf[..read]), "Login request received");

    let outcome = handshake.process_login(&buf[..read], registry)?;
    if let LoginOutcome::Accepted { collided: true, .. } = outcome {
        metrics.player_id_collision();
    }

    write_packet(stream, outcome.response(), config.write_timeout, metrics).await?;
    handshake.advance(HandshakeState::ResponseSent)?;

    match &outcome {
        LoginOutcome::Accepted { player_id, .. } => info!(player_id, "Login accepted"),
        LoginOutcome::Rejected { reason, .. } => info!(reason = %reason, "Login rejected"),
    }

    Ok(outcome)
}

async fn write_packet<S>(
    stream: &mut S,
    packet: &Packet,
    deadline: Duration,
    metrics: &Metrics,
) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let bytes = packet.to_bytes();
    with_timeout_error(
        async {
            stream.write_all(&bytes).await?;
            stream.flush().await?;
            Ok::<(), ProtocolError>(())
        },
        deadline,
    )
    .await?;
    metrics.packet_sent(bytes.len() as u64);
    Ok(())
}
