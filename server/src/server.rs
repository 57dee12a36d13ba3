use crate::broadcast::{self, Broadcaster, Outbound};
use crate::config::ServerConfig;
use crate::connection;
use crate::store::{EntityStore, SharedStore};
use crate::{ai, regen};
use futures::future::join_all;
use log::{error, info, warn};
use shared::Room;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle, JoinSet};

/// Everything a task needs to read or change the world. Cheap to clone.
#[derive(Debug, Clone)]
pub struct GameContext {
    pub store: SharedStore,
    pub room: Arc<Room>,
    pub broadcast: Broadcaster,
}

impl GameContext {
    pub fn new(broadcast: Broadcaster) -> Self {
        Self {
            store: EntityStore::shared(),
            room: Arc::new(Room::dungeon()),
            broadcast,
        }
    }
}

/// Requests a graceful stop from any task.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger(Arc<watch::Sender<bool>>);

impl ShutdownTrigger {
    pub fn fire(&self) {
        // send_replace succeeds even when no receiver is left
        self.0.send_replace(true);
    }
}

pub struct GameServer {
    config: ServerConfig,
    ctx: GameContext,
    queue: Option<mpsc::Receiver<Outbound>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    background: Vec<JoinHandle<()>>,
    connections: JoinSet<()>,
}

impl GameServer {
    pub fn new(config: ServerConfig) -> Self {
        let (broadcast, queue) = Broadcaster::channel(config.broadcast_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            ctx: GameContext::new(broadcast),
            queue: Some(queue),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            background: Vec::new(),
            connections: JoinSet::new(),
        }
    }

    pub fn context(&self) -> &GameContext {
        &self.ctx
    }

    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger(Arc::clone(&self.shutdown_tx))
    }

    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        let listener = TcpListener::bind(self.config.address()).await?;
        info!(
            "Server listening on {} (WebSocket path {})",
            listener.local_addr()?,
            self.config.ws_path
        );
        Ok(listener)
    }

    /// Starts fan-out, enemy AI and rage decay. Calling it again is a no-op.
    pub fn start_background_tasks(&mut self) {
        let Some(queue) = self.queue.take() else {
            return;
        };

        self.background.push(tokio::spawn(broadcast::run_fan_out(
            Arc::clone(&self.ctx.store),
            queue,
            self.shutdown_rx.clone(),
        )));
        self.background.push(tokio::spawn(ai::run(
            self.ctx.clone(),
            self.config.ai_tick(),
            self.shutdown_rx.clone(),
        )));
        self.background.push(tokio::spawn(regen::run(
            self.ctx.clone(),
            self.config.regen_interval(),
            self.shutdown_rx.clone(),
        )));
        info!(
            "Background tasks started (AI every {:?}, rage decay every {:?})",
            self.config.ai_tick(),
            self.config.regen_interval()
        );
    }

    /// Accepts connections until the shutdown trigger fires.
    pub async fn run(&mut self, listener: TcpListener) {
        self.start_background_tasks();
        let mut shutdown = self.shutdown_rx.clone();
        if *shutdown.borrow() {
            return;
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_connection(stream, peer),
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                Some(finished) = self.connections.join_next(), if !self.connections.is_empty() => {
                    if let Err(e) = finished {
                        if e.is_panic() {
                            error!("Connection task panicked: {}", e);
                        }
                    }
                }
            }
        }
    }

    fn spawn_connection(&mut self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        info!("Incoming connection from {}", peer);
        self.connections.spawn(connection::accept_connection(
            stream,
            peer,
            self.ctx.clone(),
            self.config.ws_path.clone(),
        ));
    }

    /// Stops every task: signals shutdown, closes client sockets and waits
    /// for tasks to finish. Anything still running after the configured
    /// timeout is aborted, including closes stuck behind a stalled peer.
    pub async fn shutdown(mut self) {
        self.shutdown_trigger().fire();

        let clients = self.ctx.store.read().await.connections();
        let aborts: Vec<AbortHandle> = self
            .background
            .iter()
            .map(JoinHandle::abort_handle)
            .collect();
        let background = std::mem::take(&mut self.background);
        let connections = &mut self.connections;
        let drain = async move {
            join_all(clients.iter().map(|client| client.close())).await;
            for task in background {
                if let Err(e) = task.await {
                    warn!("Background task ended abnormally: {}", e);
                }
            }
            while connections.join_next().await.is_some() {}
        };

        if tokio::time::timeout(self.config.shutdown_timeout(), drain)
            .await
            .is_err()
        {
            warn!("Shutdown timed out, aborting remaining tasks");
            for abort in aborts {
                abort.abort();
            }
            self.connections.abort_all();
        }
        info!("Server stopped");
    }
}
