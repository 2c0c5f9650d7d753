use serde::{Deserialize, Serialize};

use crate::models::{Message, User};

// -- JWT Claims --

/// Claims issued by the external identity service. Shared between the
/// REST middleware and the client crate; canonical definition lives
/// here to eliminate duplication. `sub` is the identity-service user
/// id and is trusted as-is once the signature checks out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub exp: usize,
}

// -- Messages --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationRequest {
    pub to_user_id: String,
}

/// Envelope for `POST /messages/send`. `message` is present on
/// success, `error` on failure; the sender always learns definitively
/// whether the message was stored.
#[derive(Debug, Serialize, Deserialize)]
pub struct SendResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub success: bool,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: User,
}

// -- Profile sync --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncProfileRequest {
    pub username: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncProfileResponse {
    pub success: bool,
}
