//! WebSocket listener
//!
//! Accepts TCP connections, upgrades them to WebSocket and hands each one
//! to its own task.

mod connection;
mod handshake;

pub use handshake::parse_handshake;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::ServerSettings;
use crate::error::{Error, Result};
use crate::hub::Hub;

pub struct HubServer {
    listener: TcpListener,
    hub: Arc<Hub>,
    outbound_queue_size: usize,
}

impl HubServer {
    /// Bind the listener described by `settings`
    pub async fn bind(settings: &ServerSettings, hub: Arc<Hub>) -> Result<Self> {
        let addr = settings.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;

        Ok(Self {
            listener,
            hub,
            outbound_queue_size: settings.outbound_queue_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Serve until the process exits
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = self.local_addr()?;
        info!(
            addr = %local_addr,
            min_pool_size = self.hub.topology().min_pool_size(),
            "Hub listening"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Listener shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, remote_addr)) => {
                            debug!(remote_addr = %remote_addr, "Incoming connection");
                            let hub = Arc::clone(&self.hub);
                            let queue_size = self.outbound_queue_size;
                            tokio::spawn(async move {
                                if let Err(e) = connection::serve_connection(hub, stream, remote_addr, queue_size).await {
                                    debug!(remote_addr = %remote_addr, error = %e, "Connection ended with error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Accept failed");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }
        }
    }
}
