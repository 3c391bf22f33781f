//! The simulator: two TCP listeners over one shared device
//!
//! One task per accepted connection; each read is one request document and
//! produces exactly one response document. Faults are scoped to the
//! connection that caused them — the listeners never die on bad input.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, broadcast, mpsc};

use super::config::PedConfig;
use super::dispatcher::Dispatcher;
use super::documents;
use super::events::PedEvent;
use super::secondary::SecondaryCommands;
use crate::actor::ActorLink;
use crate::error::{PedError, Result};
use crate::protocol::envelope::parse;
use crate::protocol::pairing::{CredentialStore, PairingCredentials};
use crate::state::StateHandle;

/// Simulator run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorState {
    /// Not accepting connections
    Stopped,
    /// Listeners starting
    Starting,
    /// Accepting connections on both ports
    Running,
    /// Shutting down
    Stopping,
}

/// The emulated payment-entry device
pub struct PedSimulator {
    config: PedConfig,
    state: StateHandle,
    actor: Arc<ActorLink>,
    store: Arc<dyn CredentialStore>,
    credentials: Arc<RwLock<PairingCredentials>>,
    event_tx: broadcast::Sender<PedEvent>,
    run_state: Arc<RwLock<SimulatorState>>,
    bound: Arc<RwLock<Option<(SocketAddr, SocketAddr)>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl PedSimulator {
    /// Create a simulator
    ///
    /// The actor link and credential store are injected so the embedder
    /// owns the actor transport and the persistence location.
    #[must_use]
    pub fn new(config: PedConfig, store: Arc<dyn CredentialStore>, actor: Arc<ActorLink>) -> Self {
        let (event_tx, _) = broadcast::channel(64);

        Self {
            config,
            state: StateHandle::new(),
            actor,
            store,
            credentials: Arc::new(RwLock::new(PairingCredentials::default())),
            event_tx,
            run_state: Arc::new(RwLock::new(SimulatorState::Stopped)),
            bound: Arc::new(RwLock::new(None)),
            shutdown_tx: None,
        }
    }

    /// Subscribe to simulator events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PedEvent> {
        self.event_tx.subscribe()
    }

    /// Current run state
    pub async fn run_state(&self) -> SimulatorState {
        *self.run_state.read().await
    }

    /// Handle to the shared device state
    #[must_use]
    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    /// Snapshot of the current pairing credentials
    pub async fn pairing_credentials(&self) -> PairingCredentials {
        self.credentials.read().await.clone()
    }

    /// Bound listener addresses, available once started
    pub async fn local_addrs(&self) -> Option<(SocketAddr, SocketAddr)> {
        *self.bound.read().await
    }

    /// Start both listeners
    ///
    /// # Errors
    ///
    /// Returns error if already running, a port cannot be bound, or the
    /// persisted credentials cannot be loaded.
    pub async fn start(&mut self) -> Result<()> {
        {
            let mut run_state = self.run_state.write().await;
            if *run_state != SimulatorState::Stopped {
                return Err(PedError::AlreadyRunning);
            }
            *run_state = SimulatorState::Starting;
        }

        // Pairing survives restarts; load before accepting any traffic.
        let persisted = self.store.load().await?;
        *self.credentials.write().await = persisted;

        let primary =
            TcpListener::bind((self.config.bind_addr, self.config.primary_port)).await?;
        let secondary =
            TcpListener::bind((self.config.bind_addr, self.config.secondary_port)).await?;

        let primary_addr = primary.local_addr()?;
        let secondary_addr = secondary.local_addr()?;
        *self.bound.write().await = Some((primary_addr, secondary_addr));

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        self.shutdown_tx = Some(shutdown_tx);

        let dispatcher = Arc::new(Dispatcher::new(
            self.config.clone(),
            self.state.clone(),
            self.credentials.clone(),
            self.store.clone(),
            self.actor.clone(),
            self.event_tx.clone(),
        ));
        let secondary_commands = Arc::new(SecondaryCommands::new(self.state.clone()));

        self.state.update(|s| s.connected = true).await;
        *self.run_state.write().await = SimulatorState::Running;
        let _ = self.event_tx.send(PedEvent::Started {
            primary: primary_addr,
            secondary: secondary_addr,
        });
        tracing::info!(%primary_addr, %secondary_addr, "simulator listening");

        let event_tx = self.event_tx.clone();
        let run_state = self.run_state.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = primary.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                let dispatcher = dispatcher.clone();
                                let event_tx = event_tx.clone();
                                tokio::spawn(async move {
                                    handle_primary_connection(stream, addr, dispatcher, event_tx)
                                        .await;
                                });
                            }
                            Err(e) => tracing::error!("primary accept error: {e}"),
                        }
                    }
                    result = secondary.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                let handler = secondary_commands.clone();
                                let event_tx = event_tx.clone();
                                tokio::spawn(async move {
                                    handle_secondary_connection(stream, addr, handler, event_tx)
                                        .await;
                                });
                            }
                            Err(e) => tracing::error!("secondary accept error: {e}"),
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }

            state.update(|s| s.connected = false).await;
            *run_state.write().await = SimulatorState::Stopped;
            let _ = event_tx.send(PedEvent::Stopped);
        });

        Ok(())
    }

    /// Stop the listeners
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
            *self.run_state.write().await = SimulatorState::Stopping;
        }
    }
}

async fn handle_primary_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    event_tx: broadcast::Sender<PedEvent>,
) {
    let _ = event_tx.send(PedEvent::ClientConnected { address: addr });
    tracing::debug!(%addr, "primary client connected");

    let mut buf = vec![0u8; 4096];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::error!(%addr, "read error: {e}");
                break;
            }
        };

        let response = match parse(&buf[..n]) {
            Ok(request) => match dispatcher.handle(&request).await {
                Ok(rendered) => rendered,
                Err(e) => {
                    tracing::warn!(%addr, error = %e, "command failed");
                    documents::xml_format_incorrect()
                }
            },
            Err(e) => {
                tracing::warn!(%addr, error = %e, "unparsable request");
                documents::xml_format_incorrect()
            }
        };

        if stream.write_all(response.as_bytes()).await.is_err() {
            break;
        }
    }

    let _ = event_tx.send(PedEvent::ClientDisconnected { address: addr });
    tracing::debug!(%addr, "primary client disconnected");
}

async fn handle_secondary_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    handler: Arc<SecondaryCommands>,
    event_tx: broadcast::Sender<PedEvent>,
) {
    let _ = event_tx.send(PedEvent::ClientConnected { address: addr });
    tracing::debug!(%addr, "secondary client connected");

    let mut buf = vec![0u8; 4096];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::error!(%addr, "read error: {e}");
                break;
            }
        };

        let response = match parse(&buf[..n]) {
            Ok(request) => handler.handle(&request).await,
            Err(e) => {
                tracing::warn!(%addr, error = %e, "unparsable request");
                documents::xml_format_incorrect()
            }
        };

        if stream.write_all(response.as_bytes()).await.is_err() {
            break;
        }
    }

    let _ = event_tx.send(PedEvent::ClientDisconnected { address: addr });
    tracing::debug!(%addr, "secondary client disconnected");
}
