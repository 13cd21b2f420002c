//! REST-API (/v1/...)
//!
//! Die Identitaet des Aufrufers setzt die vorgelagerte Auth-Schicht im
//! Header `x-user-id` (24-stellige Hex-ID).

pub mod handlers;
pub mod routes;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use hushline_chat::ChatError;
use hushline_core::ObjektId;
use serde_json::json;

/// Header mit der ID des authentifizierten Benutzers
pub const USER_HEADER: &str = "x-user-id";

/// Fehlerantwort fuer REST-API
pub fn fehler_antwort(status: StatusCode, code: &str, nachricht: &str) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": nachricht
        })),
    )
        .into_response()
}

/// Bildet einen Service-Fehler auf Status und JSON-Body ab
pub fn chat_fehler(e: ChatError) -> Response {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(fehler = %e, "Anfrage fehlgeschlagen");
    } else {
        tracing::debug!(fehler = %e, status = status.as_u16(), "Anfrage abgelehnt");
    }
    fehler_antwort(status, e.code(), &e.to_string())
}

/// Liest den Aufrufer aus `x-user-id`
pub fn aufrufer_aus_headers(headers: &HeaderMap) -> Result<ObjektId, Response> {
    let roh = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            fehler_antwort(
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "Header x-user-id fehlt",
            )
        })?;
    roh.parse::<ObjektId>().map_err(|_| {
        fehler_antwort(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "Header x-user-id ist keine gueltige ID",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn aufrufer_aus_gueltigem_header() {
        let id = ObjektId::neu();
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_str(&id.to_hex()).unwrap());
        assert_eq!(aufrufer_aus_headers(&headers).unwrap(), id);
    }

    #[test]
    fn aufrufer_ohne_header() {
        let antwort = aufrufer_aus_headers(&HeaderMap::new()).unwrap_err();
        assert_eq!(antwort.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn aufrufer_mit_ungueltiger_id() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_static("nicht-hex"));
        let antwort = aufrufer_aus_headers(&headers).unwrap_err();
        assert_eq!(antwort.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn chat_fehler_status() {
        assert_eq!(chat_fehler(ChatError::DoppelterChat).status(), StatusCode::CONFLICT);
        assert_eq!(chat_fehler(ChatError::Gebannt).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            chat_fehler(ChatError::PublicKeysUnvollstaendig).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
