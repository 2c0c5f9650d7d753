use serde::{Deserialize, Serialize};

use crate::models::Message;

/// Events pushed over a recipient's live channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PushEvent {
    /// A new message addressed to the connected user was persisted
    MessageCreate(Message),
}
