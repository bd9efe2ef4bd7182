//! Relay server listener
//!
//! Handles the TCP accept loop, spawns connection handlers, and runs the
//! registry over the events they raise.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Semaphore};

use crate::error::Result;
use crate::registry::{ChannelRegistry, RegistryConfig};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::peers::PeerTable;
use crate::transport::{Address, TransportEvent};

/// Relay server
///
/// A server runs once: shutting it down closes its registry for good.
pub struct RelayServer {
    config: ServerConfig,
    peers: Arc<PeerTable>,
    registry: Arc<ChannelRegistry<PeerTable>>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl RelayServer {
    /// Create a new server with default registry configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry_config(config, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let peers = Arc::new(PeerTable::new());
        let registry = Arc::new(ChannelRegistry::with_config(
            Arc::clone(&peers),
            registry_config,
        ));

        Self {
            config,
            peers,
            registry,
            connection_semaphore,
        }
    }

    /// Get a reference to the channel registry
    pub fn registry(&self) -> &Arc<ChannelRegistry<PeerTable>> {
        &self.registry
    }

    /// Run the server until the process exits
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Bind the configured address and run with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Run on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "Relay server listening");

        let (events_tx, events_rx) = mpsc::channel(self.config.event_queue_size.max(1));
        let dispatcher = tokio::spawn(Arc::clone(&self.registry).run(events_rx));

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener, &events_tx) => result,
        };

        self.registry.shutdown().await;
        dispatcher.abort();

        result
    }

    async fn accept_loop(
        &self,
        listener: &TcpListener,
        events: &mpsc::Sender<TransportEvent>,
    ) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr, events);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(
        &self,
        socket: TcpStream,
        peer_addr: SocketAddr,
        events: &mpsc::Sender<TransportEvent>,
    ) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(peer = %peer_addr, error = %e, "Failed to configure socket");
            return;
        }

        tracing::debug!(peer = %peer_addr, "New connection");

        let addr = Address::from(peer_addr);
        let connection = Connection::new(
            addr.clone(),
            socket,
            self.config.clone(),
            Arc::clone(&self.peers),
            events.clone(),
        );

        tokio::spawn(async move {
            // Held for the lifetime of the connection
            let _permit = permit;

            if let Err(e) = connection.run().await {
                tracing::debug!(peer = %addr, error = %e, "Connection error");
            }

            tracing::debug!(peer = %addr, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}
