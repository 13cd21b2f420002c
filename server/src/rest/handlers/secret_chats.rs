//! REST-Handler fuer Secret-Chats (Handshake, Verlauf, Loeschen)

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use hushline_chat::{
    PublicKeyAnfrage, SecretChatAnfrage, SecretChatAnsicht, SymmetrischeSchluesselAnfrage,
};
use hushline_core::{ObjektId, RaumId, UserId};

use crate::rest::handlers::SeitenParameter;
use crate::rest::{aufrufer_aus_headers, chat_fehler};
use crate::state::AppState;

fn ansicht(chat: hushline_db::models::SecretChatRecord) -> Json<SecretChatAnsicht> {
    Json(SecretChatAnsicht::from(chat))
}

pub async fn create_secret_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SecretChatAnfrage>,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.secret_chats.erstellen(aufrufer, body.target_user_id, body.expire_at).await {
        Ok(chat) => (StatusCode::CREATED, ansicht(chat)).into_response(),
        Err(e) => chat_fehler(e),
    }
}

/// Secret-Chats des Aufrufers, auch Einladungen, die er noch annehmen muss
pub async fn list_secret_chats(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.secret_chats.fuer_benutzer(aufrufer).await {
        Ok(chats) => {
            let ansichten: Vec<SecretChatAnsicht> =
                chats.into_iter().map(SecretChatAnsicht::from).collect();
            Json(ansichten).into_response()
        }
        Err(e) => chat_fehler(e),
    }
}

pub async fn get_secret_chat(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    headers: HeaderMap,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.secret_chats.laden(id, aufrufer).await {
        Ok(chat) => ansicht(chat).into_response(),
        Err(e) => chat_fehler(e),
    }
}

pub async fn put_public_key(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    headers: HeaderMap,
    Json(body): Json<PublicKeyAnfrage>,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.secret_chats.public_key_hochladen(id, aufrufer, &body.public_key).await {
        Ok(chat) => ansicht(chat).into_response(),
        Err(e) => chat_fehler(e),
    }
}

pub async fn put_symmetric_key(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    headers: HeaderMap,
    Json(body): Json<SymmetrischeSchluesselAnfrage>,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state
        .secret_chats
        .symmetrische_schluessel_hochladen(
            id,
            aufrufer,
            &body.user_1_encrypted_symmetric_key,
            &body.user_2_encrypted_symmetric_key,
        )
        .await
    {
        Ok(chat) => ansicht(chat).into_response(),
        Err(e) => chat_fehler(e),
    }
}

pub async fn approve_secret_chat(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    headers: HeaderMap,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    match state.secret_chats.annehmen(id, aufrufer).await {
        Ok(chat) => ansicht(chat).into_response(),
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
    match state.secret_chats.nachrichten(id, aufrufer, seite.seite()).await {
        Ok(nachrichten) => Json(nachrichten).into_response(),
        Err(e) => chat_fehler(e),
    }
}

/// Loescht den Chat und beendet offene Live-Verbindungen darauf
pub async fn delete_secret_chat(
    State(state): State<AppState>,
    Path(id): Path<ObjektId>,
    headers: HeaderMap,
) -> Response {
    let aufrufer = match aufrufer_aus_headers(&headers) {
        Ok(a) => a,
        Err(r) => return r,
    };
    let chat = match state.secret_chats.laden(id, aufrufer).await {
        Ok(c) => c,
        Err(e) => return chat_fehler(e),
    };
    if let Err(e) = state.secret_chats.loeschen(id, aufrufer).await {
        return chat_fehler(e);
    }
    let raum = RaumId::from(id);
    for teilnehmer in [chat.user_1, chat.user_2] {
        state.aus_raum_trennen(&raum, &UserId::from(teilnehmer));
    }
    StatusCode::NO_CONTENT.into_response()
}
