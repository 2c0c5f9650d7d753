use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use lattice_types::api::SendResponse;

use crate::media::MediaError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("message text or image required")]
    MissingContent,
    #[error("recipient not found")]
    RecipientNotFound,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("image exceeds upload limit")]
    ImageTooLarge,
    #[error("media processing failed: {0}")]
    Media(#[from] MediaError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingContent | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::RecipientNotFound | Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::ImageTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Media(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(e) => {
                error!("internal error: {:#}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = SendResponse {
            success: false,
            message: None,
            error: Some(message),
        };
        (status, Json(body)).into_response()
    }
}
