use futures::{Sink, SinkExt};
use log::debug;
use shared::Envelope;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Write half of a client socket, type-erased so tests can substitute an
/// in-memory channel.
pub type BoxedSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("websocket write failed: {0}")]
    Transport(#[from] WsError),
}

/// Outbound side of one connected player.
///
/// The sink sits behind its own mutex so that at most one task writes to a
/// socket at a time. This lock is independent of the entity store lock and
/// must never be awaited while the store lock is held.
pub struct ClientConnection {
    player_id: String,
    sink: Mutex<BoxedSink>,
}

impl ClientConnection {
    pub fn new<S>(player_id: impl Into<String>, sink: S) -> Self
    where
        S: Sink<Message, Error = WsError> + Send + 'static,
    {
        Self {
            player_id: player_id.into(),
            sink: Mutex::new(Box::pin(sink)),
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub async fn send(&self, envelope: &Envelope) -> Result<(), ConnectionError> {
        let text = envelope.to_text()?;
        self.send_text(text).await
    }

    /// Writes an already serialized envelope. Used by the broadcaster so a
    /// message is encoded once for all recipients.
    pub async fn send_text(&self, text: String) -> Result<(), ConnectionError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Takes the write lock for a run of writes that must not be interleaved
    /// with broadcasts, such as the join handshake.
    pub async fn writer(&self) -> ConnectionWriter<'_> {
        ConnectionWriter {
            sink: self.sink.lock().await,
        }
    }

    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.close().await {
            debug!("Closing connection for player {}: {}", self.player_id, e);
        }
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("player_id", &self.player_id)
            .finish_non_exhaustive()
    }
}

/// Exclusive write access to one connection.
pub struct ConnectionWriter<'a> {
    sink: MutexGuard<'a, BoxedSink>,
}

impl ConnectionWriter<'_> {
    pub async fn send(&mut self, envelope: &Envelope) -> Result<(), ConnectionError> {
        let text = envelope.to_text()?;
        self.sink.send(Message::Text(text)).await?;
        Ok(())
    }
}
