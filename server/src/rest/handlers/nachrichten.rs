//! REST-Handler fuer regulaeren Verlauf, Bearbeiten und Soft-Delete

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use hushline_core::ObjektId;
use serde::Deserialize;

use crate::rest::handlers::SeitenParameter;
use crate::rest::{aufrufer_aus_headers, chat_fehler};
use crate::state::AppState;

pub async fn list_chat_messages(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    Query(seite): Query<SeitenParameter>,
    headers: HeaderMap,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.verlauf.chat_nachrichten(id, aufrufer, seite.seite()).await {
        Ok(nachrichten) => Json(nachrichten).into_response(),
        Err(e) => chat_fehler(e),
    }
}

pub async fn list_group_messages(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    Query(seite): Query<SeitenParameter>,
    headers: HeaderMap,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.verlauf.gruppen_nachrichten(id, aufrufer, seite.seite()).await {
        Ok(nachrichten) => Json(nachrichten).into_response(),
        Err(e) => chat_fehler(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct BearbeitenBody {
    pub content: String,
}

pub async fn update_message(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    headers: HeaderMap,
    Json(body): Json<BearbeitenBody>,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.verlauf.nachricht_bearbeiten(id, aufrufer, &body.content).await {
        Ok(nachricht) => Json(nachricht).into_response(),
        Err(e) => chat_fehler(e),
    }
}

pub async fn delete_for_sender(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    headers: HeaderMap,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.verlauf.fuer_sender_loeschen(id, aufrufer).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => chat_fehler(e),
    }
}

pub async fn delete_for_receiver(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    headers: HeaderMap,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.verlauf.fuer_empfaenger_loeschen(id, aufrufer).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => chat_fehler(e),
    }
}

pub async fn delete_for_all(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    headers: HeaderMap,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.verlauf.fuer_alle_loeschen(id, aufrufer).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => chat_fehler(e),
    }
}
