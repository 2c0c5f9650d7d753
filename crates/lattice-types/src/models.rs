use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A profile row mirrored from the external identity service.
/// Lattice never creates accounts itself; rows arrive through the
/// profile sync endpoint and exist so recipients can be validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

/// A direct message between two users.
///
/// Invariant: `Image` messages carry a non-empty `media_url`; `Text`
/// messages carry non-empty `text`. `seen` is the only field that
/// changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub from_user_id: String,
    pub to_user_id: String,
    pub message_type: MessageKind,
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub seen: bool,
    pub created_at: DateTime<Utc>,
}
