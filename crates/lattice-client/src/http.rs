use thiserror::Error;

use lattice_types::api::{
    ConversationRequest, ConversationResponse, ProfileResponse, SendResponse, SyncProfileRequest,
    SyncProfileResponse,
};
use lattice_types::models::{Message, User};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server rejected request: {0}")]
    Server(String),
}

/// Thin HTTP client for the messaging endpoints. One instance per
/// logged-in user; the bearer token comes from the identity service.
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub async fn send_text(&self, to_user_id: &str, text: &str) -> Result<Message, ClientError> {
        let form = reqwest::multipart::Form::new()
            .text("to_user_id", to_user_id.to_string())
            .text("text", text.to_string());
        self.send_form(form).await
    }

    pub async fn send_image(
        &self,
        to_user_id: &str,
        filename: &str,
        bytes: Vec<u8>,
        caption: Option<&str>,
    ) -> Result<Message, ClientError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let mut form = reqwest::multipart::Form::new()
            .text("to_user_id", to_user_id.to_string())
            .part("image", part);
        if let Some(caption) = caption {
            form = form.text("text", caption.to_string());
        }
        self.send_form(form).await
    }

    async fn send_form(&self, form: reqwest::multipart::Form) -> Result<Message, ClientError> {
        let resp: SendResponse = self
            .http
            .post(self.url("/messages/send"))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;

        match resp.message {
            Some(message) if resp.success => Ok(message),
            _ => Err(ClientError::Server(
                resp.error.unwrap_or_else(|| "send failed".to_string()),
            )),
        }
    }

    /// Full conversation with `to_user_id`, as stored. Feed the result
    /// to `ConversationStore::load`, which owns the ordering.
    pub async fn conversation(&self, to_user_id: &str) -> Result<Vec<Message>, ClientError> {
        let resp: ConversationResponse = self
            .http
            .post(self.url("/messages/get"))
            .bearer_auth(&self.token)
            .json(&ConversationRequest {
                to_user_id: to_user_id.to_string(),
            })
            .send()
            .await?
            .json()
            .await?;

        if resp.success {
            Ok(resp.messages)
        } else {
            Err(ClientError::Server("conversation fetch failed".to_string()))
        }
    }

    /// Latest messages addressed to the caller, for the sidebar feed.
    pub async fn recent(&self) -> Result<Vec<Message>, ClientError> {
        let resp: ConversationResponse = self
            .http
            .get(self.url("/messages/recent"))
            .bearer_auth(&self.token)
            .send()
            .await?
            .json()
            .await?;

        if resp.success {
            Ok(resp.messages)
        } else {
            Err(ClientError::Server("recent fetch failed".to_string()))
        }
    }

    /// Profile of a conversation counterpart, for the chat header.
    pub async fn profile(&self, user_id: &str) -> Result<User, ClientError> {
        let resp: ProfileResponse = self
            .http
            .get(self.url(&format!("/users/{}", user_id)))
            .bearer_auth(&self.token)
            .send()
            .await?
            .json()
            .await?;

        if resp.success {
            Ok(resp.user)
        } else {
            Err(ClientError::Server("profile fetch failed".to_string()))
        }
    }

    /// Mirror the identity-service profile so other users can message
    /// this account.
    pub async fn sync_profile(&self, profile: &SyncProfileRequest) -> Result<(), ClientError> {
        let resp: SyncProfileResponse = self
            .http
            .post(self.url("/users/sync"))
            .bearer_auth(&self.token)
            .json(profile)
            .send()
            .await?
            .json()
            .await?;

        if resp.success {
            Ok(())
        } else {
            Err(ClientError::Server("profile sync failed".to_string()))
        }
    }
}
