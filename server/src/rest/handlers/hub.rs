//! REST-Handler fuer den Live-Zustand des Hubs

use axum::{
    extract::State,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::state::AppState;

/// GET /v1/hub/stats
pub async fn get_stats(State(state): State<AppState>) -> Response {
    Json(json!({
        "statistik": state.signaling.hub.statistik(),
        "uptime_seconds": state.signaling.uptime_sek(),
    }))
    .into_response()
}

/// GET /v1/hub/capacity – Raeume an oder ueber ihrer Kapazitaet
pub async fn get_capacity(State(state): State<AppState>) -> Response {
    Json(state.signaling.hub.kapazitaet_pruefen()).into_response()
}
