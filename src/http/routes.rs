//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.client_origin);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/rooms", post(create_room_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS configuration - support multiple origins (comma-separated)
fn build_cors(client_origin: &str) -> CorsLayer {
    if client_origin.trim() == "*" {
        return CorsLayer::permissive();
    }

    let allowed_origins: Vec<header::HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_rooms: usize,
    active_games: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_rooms: state.rooms.active_rooms(),
        active_games: state.games.active_games(),
    })
}

// ============================================================================
// Room creation
// ============================================================================

#[derive(Serialize)]
struct CreateRoomResponse {
    #[serde(rename = "roomId")]
    room_id: String,
}

async fn create_room_handler(State(state): State<AppState>) -> Json<CreateRoomResponse> {
    Json(CreateRoomResponse {
        room_id: state.rooms.create_room(),
    })
}
