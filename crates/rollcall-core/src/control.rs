//! Administrative message channel for the cache worker.
//!
//! Wire shape:
//!
//! ```text
//! -> { "type": "CLEAR_CACHE" }   (with a reply port)
//! <- { "cleared": true }
//! ```
//!
//! Anything else is ignored and gets no reply.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::cache::AssetCache;

/// Buffer size for queued control messages.
/// Messages are rare and handled quickly; a handful of slots is plenty.
const CHANNEL_BUFFER_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Delete the active generation's bucket
    #[serde(rename = "CLEAR_CACHE")]
    ClearCache,
    #[serde(other)]
    Unknown,
}

impl ControlMessage {
    /// Decode a message from its JSON form. Anything undecodable is `Unknown`.
    pub fn from_json(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or(ControlMessage::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlReply {
    pub cleared: bool,
}

struct Envelope {
    message: ControlMessage,
    reply: Option<oneshot::Sender<ControlReply>>,
}

/// Handles control messages addressed to one active generation.
#[derive(Debug, Clone)]
pub struct ControlChannel {
    cache: AssetCache,
    active_tag: String,
}

impl ControlChannel {
    pub fn new(cache: AssetCache, active_tag: impl Into<String>) -> Self {
        Self {
            cache,
            active_tag: active_tag.into(),
        }
    }

    /// Handle one message, answering on `reply` when the message defines a reply.
    pub async fn handle(&self, message: ControlMessage, reply: Option<oneshot::Sender<ControlReply>>) {
        match message {
            ControlMessage::ClearCache => {
                let cleared = self.cache.delete(&self.active_tag).await;
                debug!(tag = %self.active_tag, cleared, "Handled CLEAR_CACHE");
                if let Some(reply) = reply {
                    // The sender may have stopped listening
                    let _ = reply.send(ControlReply { cleared });
                }
            }
            ControlMessage::Unknown => {
                debug!("Ignoring unrecognized control message");
            }
        }
    }

    /// Run the channel on its own task and return a handle for posting to it.
    pub fn spawn(self) -> ControlHandle {
        let (tx, mut rx) = mpsc::channel::<Envelope>(CHANNEL_BUFFER_SIZE);
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                self.handle(envelope.message, envelope.reply).await;
            }
            debug!("Control channel closed");
        });
        ControlHandle { tx }
    }
}

/// Sending side of a spawned [`ControlChannel`].
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<Envelope>,
}

impl ControlHandle {
    /// Post `message` and wait for its reply.
    /// Returns `None` for messages that get no reply, or if the channel is gone.
    pub async fn post(&self, message: ControlMessage) -> Option<ControlReply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            message,
            reply: Some(reply_tx),
        };
        if self.tx.send(envelope).await.is_err() {
            return None;
        }
        reply_rx.await.ok()
    }
}
