use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use lattice_api::media::{HttpMediaPipeline, MediaPipeline};
use lattice_api::messages;
use lattice_api::middleware::require_auth;
use lattice_api::state::{AppState, AppStateInner};
use lattice_api::users;
use lattice_push::channel;
use lattice_push::registry::PushRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lattice=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("LATTICE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("LATTICE_DB_PATH").unwrap_or_else(|_| "lattice.db".into());
    let host = std::env::var("LATTICE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("LATTICE_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let media_upload_url = std::env::var("LATTICE_MEDIA_UPLOAD_URL")
        .unwrap_or_else(|_| "http://localhost:9000/upload".into());
    let media_url_endpoint = std::env::var("LATTICE_MEDIA_URL_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:9000/files".into());

    // Init database
    let db = lattice_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let registry = PushRegistry::new();
    let media: Arc<dyn MediaPipeline> =
        Arc::new(HttpMediaPipeline::new(media_upload_url, media_url_endpoint));
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        registry: registry.clone(),
        media,
        jwt_secret,
    });

    // Routes
    let protected_routes = Router::new()
        .route("/messages/send", post(messages::send_message))
        .route("/messages/get", post(messages::get_conversation))
        .route("/messages/recent", get(messages::recent_messages))
        .route("/users/sync", post(users::sync_profile))
        .route("/users/{user_id}", get(users::get_profile))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .with_state(app_state);

    // The live channel trusts the recipient id supplied in the path
    let live_route = Router::new()
        .route("/messages/{user_id}", get(channel::subscribe))
        .with_state(registry);

    let app = Router::new()
        .merge(protected_routes)
        .merge(live_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Lattice server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
