//! REST-Handler fuer Secret-Groups (Lebenszyklus, Moderation, Verlauf)

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use hushline_chat::{MitgliedAnfrage, PublicKeyAnfrage, SecretGroupAnfrage};
use hushline_core::{ObjektId, RaumId, UserId};

use crate::rest::handlers::SeitenParameter;
use crate::rest::{aufrufer_aus_headers, chat_fehler};
use crate::state::AppState;

/// Beendet die Live-Verbindung von `user` in dieser Gruppe
fn trennen(state: &AppState, group_id: ObjektId, user: ObjektId) {
    state.aus_raum_trennen(&RaumId::from(group_id), &UserId::from(user));
}

pub async fn create_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SecretGroupAnfrage>,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.secret_groups.erstellen(aufrufer, body).await {
        Ok(gruppe) => (StatusCode::CREATED, Json(gruppe)).into_response(),
        Err(e) => chat_fehler(e),
    }
}

pub async fn list_groups(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.secret_groups.fuer_benutzer(aufrufer).await {
        Ok(gruppen) => Json(gruppen).into_response(),
        Err(e) => chat_fehler(e),
    }
}

pub async fn get_group(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    headers: HeaderMap,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.secret_groups.laden(id, aufrufer).await {
        Ok(gruppe) => Json(gruppe).into_response(),
        Err(e) => chat_fehler(e),
    }
}

pub async fn join_group(
    State(state): State<AppState>,
    Path(invite_link): Path<String>,
    headers: HeaderMap,
    Json(body): Json<PublicKeyAnfrage>,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.secret_groups.beitreten(&invite_link, aufrufer, &body.public_key).await {
        Ok(mitglied) => (StatusCode::CREATED, Json(mitglied)).into_response(),
        Err(e) => chat_fehler(e),
    }
}

pub async fn leave_group(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    headers: HeaderMap,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.secret_groups.verlassen(id, aufrufer).await {
        Ok(()) => {
            trennen(&state, id, aufrufer);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => chat_fehler(e),
    }
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(ObjektId, ObjektId)>,
    headers: HeaderMap,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.secret_groups.mitglied_entfernen(id, aufrufer, user_id).await {
        Ok(()) => {
            trennen(&state, id, user_id);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => chat_fehler(e),
    }
}

pub async fn ban_member(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    headers: HeaderMap,
    Json(body): Json<MitgliedAnfrage>,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.secret_groups.bannen(id, aufrufer, body.user_id).await {
        Ok(()) => {
            trennen(&state, id, body.user_id);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => chat_fehler(e),
    }
}

pub async fn unban_member(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    headers: HeaderMap,
    Json(body): Json<MitgliedAnfrage>,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.secret_groups.entbannen(id, aufrufer, body.user_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => chat_fehler(e),
    }
}

pub async fn list_members(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    headers: HeaderMap,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.secret_groups.mitglieder(id, aufrufer).await {
        Ok(mitglieder) => Json(mitglieder).into_response(),
        Err(e) => chat_fehler(e),
    }
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    Query(seite): Query<SeitenParameter>,
    headers: HeaderMap,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.secret_groups.nachrichten(id, aufrufer, seite.seite()).await {
        Ok(nachrichten) => Json(nachrichten).into_response(),
        Err(e) => chat_fehler(e),
    }
}

/// Loescht die Gruppe und beendet alle Live-Verbindungen darauf
pub async fn delete_group(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    headers: HeaderMap,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    let gruppe = match state.secret_groups.laden(id, aufrufer).await {
        Ok(g) => g,
        Err(e) => return chat_fehler(e),
    };
    if let Err(e) = state.secret_groups.loeschen(id, aufrufer).await {
        return chat_fehler(e);
    }
    for mitglied in gruppe.members {
        trennen(&state, id, mitglied);
    }
    StatusCode::NO_CONTENT.into_response()
}
