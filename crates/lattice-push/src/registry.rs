use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use lattice_types::events::PushEvent;

/// Process-wide table of recipients with an open live channel.
///
/// An explicit service object rather than module-level state: it is
/// constructed once in the server binary and cloned into every handler
/// that needs it, so tests can run independent instances side by side.
/// At most one registration per recipient — last registration wins.
#[derive(Clone, Default)]
pub struct PushRegistry {
    inner: Arc<RwLock<HashMap<String, Registration>>>,
}

struct Registration {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<PushEvent>,
}

/// Sender half of a recipient's live channel, handed out by `lookup`.
#[derive(Clone)]
pub struct ChannelHandle {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<PushEvent>,
}

/// The receiving stream is gone. Recoverable — the message is already
/// durable, so callers downgrade this to a logged warning.
#[derive(Debug, Error)]
#[error("live channel closed")]
pub struct ChannelClosed;

impl PushRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh channel for `user_id`, replacing any previous
    /// registration. Dropping the superseded sender closes the old
    /// stream, so the older connection winds down on its own.
    pub fn register(&self, user_id: &str) -> (Uuid, mpsc::UnboundedReceiver<PushEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let previous = self
            .inner
            .write()
            .expect("push registry lock poisoned")
            .insert(user_id.to_string(), Registration { conn_id, tx });

        if previous.is_some() {
            debug!("replaced existing live channel for {}", user_id);
        }
        (conn_id, rx)
    }

    /// Remove the registration only if `conn_id` still owns it. A stale
    /// close from a superseded connection never clobbers its successor.
    pub fn unregister(&self, user_id: &str, conn_id: Uuid) {
        let mut table = self.inner.write().expect("push registry lock poisoned");
        if table
            .get(user_id)
            .is_some_and(|reg| reg.conn_id == conn_id)
        {
            table.remove(user_id);
        }
    }

    /// The currently active channel for `user_id`, if any.
    pub fn lookup(&self, user_id: &str) -> Option<ChannelHandle> {
        self.inner
            .read()
            .expect("push registry lock poisoned")
            .get(user_id)
            .map(|reg| ChannelHandle {
                conn_id: reg.conn_id,
                tx: reg.tx.clone(),
            })
    }
}

impl ChannelHandle {
    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    pub fn send(&self, event: PushEvent) -> Result<(), ChannelClosed> {
        self.tx.send(event).map_err(|_| ChannelClosed)
    }
}
