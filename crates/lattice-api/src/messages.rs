use axum::{
    Extension, Json,
    extract::{Multipart, State},
};
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use lattice_db::models::MessageRow;
use lattice_types::api::{Claims, ConversationRequest, ConversationResponse, SendResponse};
use lattice_types::events::PushEvent;
use lattice_types::models::{Message, MessageKind};

use crate::error::ApiError;
use crate::media::CHAT_IMAGE_TRANSFORMS;
use crate::state::{AppState, run_blocking};

/// Upload limit for chat images.
const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Recent-messages feed page size.
const RECENT_LIMIT: u32 = 30;

/// Parsed fields of the multipart send form.
pub struct OutgoingMessage {
    pub to_user_id: String,
    pub text: Option<String>,
    /// Image bytes plus the client-supplied filename.
    pub image: Option<(Bytes, String)>,
}

/// POST /messages/send — multipart form with `to_user_id`, optional
/// `text` and optional `image` file.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<Json<SendResponse>, ApiError> {
    let outgoing = parse_send_form(multipart).await?;
    let message = ingest(&state, &claims.sub, outgoing).await?;

    Ok(Json(SendResponse {
        success: true,
        message: Some(message),
        error: None,
    }))
}

/// Core send pipeline: validate → media → persist → best-effort push.
///
/// Returns the persisted message synchronously; the push outcome never
/// affects the result, since the message is already durable by then.
pub async fn ingest(
    state: &AppState,
    sender_id: &str,
    outgoing: OutgoingMessage,
) -> Result<Message, ApiError> {
    let text = outgoing.text.filter(|t| !t.trim().is_empty());
    if text.is_none() && outgoing.image.is_none() {
        return Err(ApiError::MissingContent);
    }

    let recipient_id = outgoing.to_user_id;
    let exists = {
        let db = state.clone();
        let recipient = recipient_id.clone();
        run_blocking(move || db.db.user_exists(&recipient)).await?
    };
    if !exists {
        return Err(ApiError::RecipientNotFound);
    }

    // Media first: a pipeline failure must abort the send before
    // anything is persisted.
    let (message_type, media_url) = match outgoing.image {
        Some((bytes, filename)) => {
            let file_path = state.media.upload(bytes, &filename).await?;
            let url = state.media.url_for(&file_path, CHAT_IMAGE_TRANSFORMS);
            (MessageKind::Image, Some(url))
        }
        None => (MessageKind::Text, None),
    };

    let message = Message {
        id: Uuid::new_v4(),
        from_user_id: sender_id.to_string(),
        to_user_id: recipient_id,
        message_type,
        text,
        media_url,
        seen: false,
        created_at: Utc::now(),
    };

    {
        let db = state.clone();
        let row = message.clone();
        run_blocking(move || {
            db.db.insert_message(
                &row.id.to_string(),
                &row.from_user_id,
                &row.to_user_id,
                row.message_type.as_str(),
                row.text.as_deref(),
                row.media_url.as_deref(),
                &row.created_at.to_rfc3339(),
            )
        })
        .await?;
    }

    // Best-effort push: a dead or missing channel is a logged no-op,
    // never a send failure — the recipient catches up on next fetch.
    if let Some(channel) = state.registry.lookup(&message.to_user_id) {
        if channel
            .send(PushEvent::MessageCreate(message.clone()))
            .is_err()
        {
            warn!(
                "live channel for {} closed mid-push; message delivered on next fetch",
                message.to_user_id
            );
        }
    }

    Ok(message)
}

/// POST /messages/get — the conversation between the caller and
/// `to_user_id`, unsorted (ordering is a client concern). Marks the
/// counterpart's messages to the caller as seen.
pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ConversationRequest>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let me = claims.sub;
    let other = req.to_user_id;

    let rows = {
        let db = state.clone();
        let (a, b) = (me.clone(), other.clone());
        run_blocking(move || {
            let rows = db.db.messages_between(&a, &b)?;
            // Read receipt: the counterpart's messages are now in
            // front of the caller.
            db.db.mark_seen(&b, &a)?;
            Ok(rows)
        })
        .await?
    };

    Ok(Json(ConversationResponse {
        success: true,
        messages: rows.into_iter().map(message_from_row).collect(),
    }))
}

/// GET /messages/recent — latest messages addressed to the caller,
/// newest first, for the recent-messages sidebar.
pub async fn recent_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let rows = {
        let db = state.clone();
        let me = claims.sub.clone();
        run_blocking(move || db.db.recent_for(&me, RECENT_LIMIT)).await?
    };

    Ok(Json(ConversationResponse {
        success: true,
        messages: rows.into_iter().map(message_from_row).collect(),
    }))
}

async fn parse_send_form(mut multipart: Multipart) -> Result<OutgoingMessage, ApiError> {
    let mut to_user_id = None;
    let mut text = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "to_user_id" => {
                to_user_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?,
                );
            }
            "text" => {
                text = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?,
                );
            }
            "image" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
                if bytes.len() > MAX_IMAGE_SIZE {
                    return Err(ApiError::ImageTooLarge);
                }
                if !bytes.is_empty() {
                    image = Some((bytes, filename));
                }
            }
            _ => {}
        }
    }

    let to_user_id = to_user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("to_user_id is required".to_string()))?;

    Ok(OutgoingMessage {
        to_user_id,
        text,
        image,
    })
}

fn message_from_row(row: MessageRow) -> Message {
    Message {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt message id '{}': {}", row.id, e);
            Uuid::default()
        }),
        message_type: MessageKind::parse(&row.message_type).unwrap_or_else(|| {
            warn!(
                "Corrupt message_type '{}' on message '{}'",
                row.message_type, row.id
            );
            MessageKind::Text
        }),
        text: row.text,
        media_url: row.media_url,
        seen: row.seen,
        created_at: row
            .created_at
            .parse::<DateTime<Utc>>()
            .or_else(|_| {
                // SQLite-formatted timestamps lack a timezone; parse as
                // naive UTC and convert.
                NaiveDateTime::parse_from_str(&row.created_at, "%Y-%m-%d %H:%M:%S")
                    .map(|ndt| ndt.and_utc())
            })
            .unwrap_or_else(|e| {
                warn!(
                    "Corrupt created_at '{}' on message '{}': {}",
                    row.created_at, row.id, e
                );
                DateTime::default()
            }),
        from_user_id: row.from_user_id,
        to_user_id: row.to_user_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaError, MediaPipeline, Transform};
    use crate::state::AppStateInner;
    use async_trait::async_trait;
    use lattice_db::Database;
    use lattice_push::registry::PushRegistry;
    use std::sync::Arc;

    struct StubMedia {
        fail: bool,
    }

    #[async_trait]
    impl MediaPipeline for StubMedia {
        async fn upload(&self, _bytes: Bytes, filename: &str) -> Result<String, MediaError> {
            if self.fail {
                Err(MediaError::Rejected("pipeline down".to_string()))
            } else {
                Ok(format!("/chat/{}", filename))
            }
        }

        fn url_for(&self, file_path: &str, _transforms: &[Transform]) -> String {
            format!("https://media.test{}", file_path)
        }
    }

    fn test_state(media_fails: bool) -> AppState {
        let db = Database::open_in_memory().unwrap();
        db.upsert_user("a", "alice", "Alice", None).unwrap();
        db.upsert_user("b", "bob", "Bob", None).unwrap();

        Arc::new(AppStateInner {
            db,
            registry: PushRegistry::new(),
            media: Arc::new(StubMedia { fail: media_fails }),
            jwt_secret: "test-secret".to_string(),
        })
    }

    fn claims(user_id: &str) -> Claims {
        Claims {
            sub: user_id.to_string(),
            username: user_id.to_string(),
            exp: usize::MAX,
        }
    }

    fn text_outgoing(to: &str, text: &str) -> OutgoingMessage {
        OutgoingMessage {
            to_user_id: to.to_string(),
            text: Some(text.to_string()),
            image: None,
        }
    }

    #[tokio::test]
    async fn text_send_persists_and_returns_message() {
        let state = test_state(false);

        let message = ingest(&state, "a", text_outgoing("b", "hi")).await.unwrap();
        assert_eq!(message.from_user_id, "a");
        assert_eq!(message.to_user_id, "b");
        assert_eq!(message.message_type, MessageKind::Text);
        assert_eq!(message.text.as_deref(), Some("hi"));
        assert!(!message.seen);

        let rows = state.db.messages_between("a", "b").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, message.id.to_string());
    }

    #[tokio::test]
    async fn send_without_content_is_rejected() {
        let state = test_state(false);

        let outgoing = OutgoingMessage {
            to_user_id: "b".to_string(),
            text: Some("   ".to_string()),
            image: None,
        };
        let err = ingest(&state, "a", outgoing).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingContent));

        assert!(state.db.messages_between("a", "b").unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_to_unknown_recipient_is_rejected() {
        let state = test_state(false);

        let err = ingest(&state, "a", text_outgoing("ghost", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::RecipientNotFound));
    }

    #[tokio::test]
    async fn registered_channel_receives_exactly_one_payload() {
        let state = test_state(false);
        let (_conn, mut rx) = state.registry.register("b");

        let sent = ingest(&state, "a", text_outgoing("b", "yo")).await.unwrap();

        let PushEvent::MessageCreate(pushed) = rx.recv().await.unwrap();
        assert_eq!(pushed.id, sent.id);
        assert_eq!(pushed.from_user_id, "a");
        assert_eq!(pushed.text.as_deref(), Some("yo"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_without_channel_still_persists() {
        let state = test_state(false);

        let message = ingest(&state, "a", text_outgoing("b", "hi")).await.unwrap();
        assert_eq!(
            state.db.messages_between("a", "b").unwrap()[0].id,
            message.id.to_string()
        );
    }

    #[tokio::test]
    async fn send_after_unregister_persists_without_error() {
        let state = test_state(false);
        let (conn_id, rx) = state.registry.register("b");
        state.registry.unregister("b", conn_id);
        drop(rx);

        let message = ingest(&state, "a", text_outgoing("b", "hi")).await.unwrap();
        assert_eq!(state.db.messages_between("a", "b").unwrap().len(), 1);
        assert_eq!(message.to_user_id, "b");
    }

    #[tokio::test]
    async fn closed_channel_is_swallowed() {
        let state = test_state(false);
        // Registered but the receiving stream is gone
        let (_conn, rx) = state.registry.register("b");
        drop(rx);

        let result = ingest(&state, "a", text_outgoing("b", "hi")).await;
        assert!(result.is_ok());
        assert_eq!(state.db.messages_between("a", "b").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn image_send_carries_media_url() {
        let state = test_state(false);

        let outgoing = OutgoingMessage {
            to_user_id: "b".to_string(),
            text: None,
            image: Some((Bytes::from_static(b"png-bytes"), "pic.png".to_string())),
        };
        let message = ingest(&state, "a", outgoing).await.unwrap();

        assert_eq!(message.message_type, MessageKind::Image);
        assert_eq!(
            message.media_url.as_deref(),
            Some("https://media.test/chat/pic.png")
        );
    }

    #[tokio::test]
    async fn media_failure_aborts_before_persist() {
        let state = test_state(true);

        let outgoing = OutgoingMessage {
            to_user_id: "b".to_string(),
            text: None,
            image: Some((Bytes::from_static(b"png-bytes"), "pic.png".to_string())),
        };
        let err = ingest(&state, "a", outgoing).await.unwrap_err();
        assert!(matches!(err, ApiError::Media(_)));

        assert!(state.db.messages_between("a", "b").unwrap().is_empty());
    }

    #[tokio::test]
    async fn conversation_fetch_marks_counterpart_messages_seen() {
        let state = test_state(false);
        ingest(&state, "a", text_outgoing("b", "hi")).await.unwrap();
        ingest(&state, "b", text_outgoing("a", "hey")).await.unwrap();

        let response = get_conversation(
            State(state.clone()),
            Extension(claims("b")),
            Json(ConversationRequest {
                to_user_id: "a".to_string(),
            }),
        )
        .await
        .unwrap();

        assert!(response.0.success);
        assert_eq!(response.0.messages.len(), 2);

        // a -> b is now seen; b -> a is untouched
        let rows = state.db.messages_between("a", "b").unwrap();
        let a_to_b = rows.iter().find(|r| r.from_user_id == "a").unwrap();
        let b_to_a = rows.iter().find(|r| r.from_user_id == "b").unwrap();
        assert!(a_to_b.seen);
        assert!(!b_to_a.seen);
    }

    #[tokio::test]
    async fn recent_feed_lists_inbound_messages() {
        let state = test_state(false);
        ingest(&state, "a", text_outgoing("b", "one")).await.unwrap();
        ingest(&state, "b", text_outgoing("a", "reply")).await.unwrap();
        ingest(&state, "a", text_outgoing("b", "two")).await.unwrap();

        let response = recent_messages(State(state.clone()), Extension(claims("b")))
            .await
            .unwrap();

        let texts: Vec<_> = response
            .0
            .messages
            .iter()
            .map(|m| m.text.as_deref().unwrap())
            .collect();
        assert_eq!(texts.len(), 2);
        assert!(texts.contains(&"one") && texts.contains(&"two"));
        assert!(response.0.messages.iter().all(|m| m.to_user_id == "b"));
    }

    #[test]
    fn row_conversion_survives_sqlite_datetime_format() {
        let row = MessageRow {
            id: Uuid::new_v4().to_string(),
            from_user_id: "a".to_string(),
            to_user_id: "b".to_string(),
            message_type: "text".to_string(),
            text: Some("hi".to_string()),
            media_url: None,
            seen: false,
            created_at: "2026-02-01 09:30:00".to_string(),
        };

        let message = message_from_row(row);
        assert_eq!(message.created_at.to_rfc3339(), "2026-02-01T09:30:00+00:00");
    }
}
