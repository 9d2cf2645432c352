use std::time::Duration;
use axum::{
    extract::{Query, State},
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};

use crate::data::InstrumentSnapshot;
use crate::hub::Hub;
use crate::websocket::{websocket_upgrade, SubscriberSettings};

const CORS_MAX_AGE_SECS: u64 = 86_400;

#[derive(Clone)]
pub struct ApiState {
    pub hub: Hub,
    pub subscriber: SubscriberSettings,
}

impl ApiState {
    pub fn new(hub: Hub, subscriber: SubscriberSettings) -> Self {
        Self { hub, subscriber }
    }
}

#[derive(Debug, Deserialize)]
pub struct StocksQuery {
    /// Cap on the number of instruments returned. Kept raw so a bad value never fails the request.
    pub n: Option<String>,
}

impl StocksQuery {
    /// A positive integer limit, or `None` for anything else.
    pub fn limit(&self) -> Option<usize> {
        self.n
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
    }
}

// GET /api/stocks - Current snapshot
pub async fn get_stocks(
    State(state): State<ApiState>,
    Query(query): Query<StocksQuery>,
) -> Json<Vec<InstrumentSnapshot>> {
    let current = state.hub.store().current();
    let instruments = current.instruments();
    let limit = query.limit().map_or(instruments.len(), |n| n.min(instruments.len()));

    Json(instruments[..limit].to_vec())
}

// GET /api/health - Health check endpoint
pub async fn health_check(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let current = state.hub.store().current();
    let last_snapshot = (!current.is_empty()).then(|| current.generated_at());

    Json(serde_json::json!({
        "status": "healthy",
        "service": "stock_socket",
        "timestamp": chrono::Utc::now(),
        "subscribers": state.hub.registry().len(),
        "instruments": current.len(),
        "last_snapshot": last_snapshot,
    }))
}

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(CORS_MAX_AGE_SECS))
}

// REST endpoints under /api and the subscription upgrade at /ws, on one listener
pub fn create_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/stocks", get(get_stocks));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(websocket_upgrade))
        .layer(cors_layer())
        .with_state(state)
}
