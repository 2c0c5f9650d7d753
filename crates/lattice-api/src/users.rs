use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use lattice_db::models::UserRow;
use lattice_types::api::{Claims, ProfileResponse, SyncProfileRequest, SyncProfileResponse};
use lattice_types::models::User;

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

/// POST /users/sync — thin wrapper over the external identity service.
/// Persists the caller's profile locally so message recipients resolve
/// without a round trip to the identity provider.
pub async fn sync_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SyncProfileRequest>,
) -> Result<Json<SyncProfileResponse>, ApiError> {
    let db = state.clone();
    let id = claims.sub.clone();
    run_blocking(move || {
        db.db.upsert_user(
            &id,
            &req.username,
            &req.full_name,
            req.profile_picture.as_deref(),
        )
    })
    .await?;

    Ok(Json(SyncProfileResponse { success: true }))
}

/// GET /users/{user_id} — profile for the conversation header.
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(user_id): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let row = {
        let db = state.clone();
        run_blocking(move || db.db.get_user_by_id(&user_id)).await?
    };

    let row = row.ok_or(ApiError::UserNotFound)?;
    Ok(Json(ProfileResponse {
        success: true,
        user: user_from_row(row),
    }))
}

fn user_from_row(row: UserRow) -> User {
    User {
        created_at: row
            .created_at
            .parse::<DateTime<Utc>>()
            .or_else(|_| {
                // SQLite datetime('now') defaults lack a timezone
                NaiveDateTime::parse_from_str(&row.created_at, "%Y-%m-%d %H:%M:%S")
                    .map(|ndt| ndt.and_utc())
            })
            .unwrap_or_else(|e| {
                warn!("Corrupt created_at '{}' on user '{}': {}", row.created_at, row.id, e);
                DateTime::default()
            }),
        id: row.id,
        username: row.username,
        full_name: row.full_name,
        profile_picture: row.profile_picture,
    }
}
