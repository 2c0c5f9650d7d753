use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::Stream;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::registry::PushRegistry;

/// Keep-alive comment interval. A dead peer fails the keep-alive
/// write, which ends the stream and releases the registration.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// GET /messages/{user_id} — the live delivery channel.
///
/// Registers the recipient and streams push events as JSON-encoded SSE
/// frames until the client disconnects. The stream never closes itself
/// after an emit; it only ends when the receiver side is replaced by a
/// newer registration or the connection drops.
pub async fn subscribe(
    State(registry): State<PushRegistry>,
    Path(user_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (conn_id, mut rx) = registry.register(&user_id);
    info!("{} connected to live channel ({})", user_id, conn_id);

    let guard = Deregister {
        registry,
        user_id,
        conn_id,
    };

    let stream = async_stream::stream! {
        // Owned by the generator: dropped, and thereby deregistered,
        // when axum drops the stream on disconnect.
        let _guard = guard;
        while let Some(event) = rx.recv().await {
            match Event::default().json_data(&event) {
                Ok(frame) => yield Ok::<_, Infallible>(frame),
                Err(e) => error!("failed to serialize push event: {}", e),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

struct Deregister {
    registry: PushRegistry,
    user_id: String,
    conn_id: Uuid,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        self.registry.unregister(&self.user_id, self.conn_id);
        debug!(
            "{} disconnected from live channel ({})",
            self.user_id, self.conn_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_registers_and_drop_deregisters() {
        let registry = PushRegistry::new();

        let response = subscribe(State(registry.clone()), Path("b".to_string())).await;
        assert!(registry.lookup("b").is_some());

        // Client goes away: axum drops the response, the generator drops
        // the guard, the registration is released.
        drop(response);
        assert!(registry.lookup("b").is_none());
    }

    #[tokio::test]
    async fn drop_of_stale_stream_keeps_newer_registration() {
        let registry = PushRegistry::new();

        let first = subscribe(State(registry.clone()), Path("b".to_string())).await;
        let _second = subscribe(State(registry.clone()), Path("b".to_string())).await;

        drop(first);
        assert!(registry.lookup("b").is_some());
    }
}
