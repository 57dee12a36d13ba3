use crate::store::SharedStore;
use log::{debug, error, warn};
use shared::{Envelope, MessageType};
use tokio::sync::{mpsc, watch};

/// One queued outbound message.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub envelope: Envelope,
    /// Player who must not receive this message.
    pub exclude: Option<String>,
}

impl Outbound {
    /// Whether `recipient` should get this message. Movement is never echoed
    /// back to the player who moved.
    pub fn is_for(&self, recipient: &str) -> bool {
        if self.exclude.as_deref() == Some(recipient) {
            return false;
        }
        !(self.envelope.kind == MessageType::PlayerMove
            && self.envelope.player_id.as_deref() == Some(recipient))
    }
}

/// Producer side of the outbound queue. Cheap to clone; every component that
/// mutates shared state holds one.
///
/// Enqueueing never blocks, so it is safe while the entity store lock is
/// held. Doing so keeps broadcast order identical to mutation order.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: mpsc::Sender<Outbound>,
}

impl Broadcaster {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queues `envelope` for every connected player. Returns false if the
    /// queue was full or closed and the message was dropped.
    pub fn send(&self, envelope: Envelope) -> bool {
        self.enqueue(Outbound {
            envelope,
            exclude: None,
        })
    }

    /// Queues `envelope` for everyone except `player_id`.
    pub fn send_except(&self, envelope: Envelope, player_id: &str) -> bool {
        self.enqueue(Outbound {
            envelope,
            exclude: Some(player_id.to_string()),
        })
    }

    fn enqueue(&self, outbound: Outbound) -> bool {
        match self.tx.try_send(outbound) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(
                    "Broadcast queue full, dropping {:?} message",
                    dropped.envelope.kind
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                debug!(
                    "Broadcast queue closed, dropping {:?} message",
                    dropped.envelope.kind
                );
                false
            }
        }
    }
}

/// Writes one queued message to every eligible connection. The message is
/// serialized once; connection handles are collected under a short read lock
/// so no socket write happens while the store is locked. Returns how many
/// connections were written successfully.
pub async fn deliver(store: &SharedStore, outbound: &Outbound) -> usize {
    let text = match outbound.envelope.to_text() {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to serialize {:?} broadcast: {}", outbound.envelope.kind, e);
            return 0;
        }
    };

    let recipients = {
        let store = store.read().await;
        store.connections()
    };

    let mut delivered = 0;
    for conn in recipients
        .iter()
        .filter(|conn| outbound.is_for(conn.player_id()))
    {
        match conn.send_text(text.clone()).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!("Broadcast to player {} failed: {}", conn.player_id(), e),
        }
    }
    delivered
}

/// Single consumer of the outbound queue. Runs until every producer is gone
/// or shutdown is signalled, flushing whatever is already queued on the way
/// out.
///
/// A delivery still in progress when shutdown arrives is abandoned along
/// with the rest of the queue: some peer has stopped reading.
pub async fn run_fan_out(
    store: SharedStore,
    mut rx: mpsc::Receiver<Outbound>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let outbound = tokio::select! {
            next = rx.recv() => match next {
                Some(outbound) => outbound,
                None => break,
            },
            _ = shutdown.changed() => {
                while let Ok(outbound) = rx.try_recv() {
                    deliver(&store, &outbound).await;
                }
                break;
            }
        };

        tokio::select! {
            biased;
            _ = deliver(&store, &outbound) => {}
            _ = shutdown.changed() => {
                warn!(
                    "Shutdown interrupted {:?} broadcast, dropping the rest of the queue",
                    outbound.envelope.kind
                );
                break;
            }
        }
    }
    debug!("Broadcast fan-out stopped");
}
