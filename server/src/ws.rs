//! WebSocket-Transport fuer Live-Sitzungen
//!
//! Pro Verbindung laufen zwei Tasks:
//!
//! ```text
//! Lese-Seite  -> Sitzung::ausfuehren (Stempeln, Persistenz, Broadcast)
//! Schreib-Task <- Send-Queue der ClientVerbindung + Schliess-Signal
//! ```
//!
//! Vor dem Upgrade werden Origin, Parameter und bei Secret-Raeumen die
//! Berechtigung geprueft. Ein voller Raum wird erst nach dem Upgrade mit
//! Fehler-Frame und Close-Code 1008 gemeldet.

use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use futures_util::{
    future,
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use hushline_core::{ObjektId, RaumId, UserId};
use hushline_signaling::{
    fehler_frame, verbindung::CLOSE_NORMAL, verbindung::CLOSE_POLICY, Ausgehend,
    ClientVerbindung, RaumArt, SignalingError, Sitzung, SitzungsArt, SitzungsKontext,
};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};

use crate::rest::{chat_fehler, fehler_antwort};
use crate::state::AppState;

/// Wartezeit auf den Schreib-Task nach Sitzungsende
const SCHREIBER_NACHLAUF: Duration = Duration::from_secs(5);

/// Query-Parameter beim Verbindungsaufbau
#[derive(Debug, Deserialize)]
pub struct VerbindungsParameter {
    pub sender_id: String,
    #[serde(default)]
    pub receiver_id: Option<String>,
}

/// Router mit den vier WebSocket-Endpunkten
pub fn ws_router() -> Router<AppState> {
    Router::new()
        .route("/ws/chats/:chat_id", get(chat_ws))
        .route("/ws/secret-chats/:chat_id", get(secret_chat_ws))
        .route("/ws/groups/:group_id", get(group_ws))
        .route("/ws/secret-groups/:group_id", get(secret_group_ws))
}

async fn chat_ws(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(p): Query<VerbindungsParameter>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    verbindung_annehmen(state, ws, &headers, SitzungsArt::Chat, id, p).await
}

async fn secret_chat_ws(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(p): Query<VerbindungsParameter>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    verbindung_annehmen(state, ws, &headers, SitzungsArt::SecretChat, id, p).await
}

async fn group_ws(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(p): Query<VerbindungsParameter>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    verbindung_annehmen(state, ws, &headers, SitzungsArt::Gruppe, id, p).await
}

async fn secret_group_ws(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(p): Query<VerbindungsParameter>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    verbindung_annehmen(state, ws, &headers, SitzungsArt::SecretGruppe, id, p).await
}

// ---------------------------------------------------------------------------
// Zulassung
// ---------------------------------------------------------------------------

/// Origin-Pruefung; ein fehlender Origin-Header wird abgelehnt
pub fn origin_erlaubt(headers: &HeaderMap, erlaubt: &[String]) -> bool {
    match headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
        None => false,
        Some(origin) => {
            let origin = origin.trim_end_matches('/');
            erlaubt.iter().any(|o| o == "*" || o == origin)
        }
    }
}

async fn verbindung_annehmen(
    state: AppState,
    ws: WebSocketUpgrade,
    headers: &HeaderMap,
    art: SitzungsArt,
    raum_id: String,
    p: VerbindungsParameter,
) -> Response {
    if !origin_erlaubt(headers, &state.origins) {
        tracing::warn!(raum_id = %raum_id, "WebSocket-Upgrade mit fremdem Origin abgelehnt");
        return fehler_antwort(StatusCode::FORBIDDEN, "origin_not_allowed", "Origin nicht erlaubt");
    }
    if p.sender_id.trim().is_empty() || raum_id.trim().is_empty() {
        return fehler_antwort(
            StatusCode::BAD_REQUEST,
            "invalid_input",
            "sender_id und Raum-ID sind erforderlich",
        );
    }
    let empfaenger_id = match art.raum_art() {
        RaumArt::Paar => {
            let empfaenger = p.receiver_id.as_deref().map(str::trim).filter(|r| !r.is_empty());
            match empfaenger {
                Some(r) => Some(UserId::neu(r)),
                None => {
                    return fehler_antwort(
                        StatusCode::BAD_REQUEST,
                        "invalid_input",
                        "receiver_id ist erforderlich",
                    );
                }
            }
        }
        RaumArt::Gruppe => None,
    };

    if let Err(antwort) = berechtigung_pruefen(&state, art, &raum_id, &p.sender_id).await {
        return antwort;
    }

    let kontext = SitzungsKontext {
        art,
        raum_id: RaumId::neu(raum_id),
        user_id: UserId::neu(p.sender_id),
        empfaenger_id,
    };
    ws.on_upgrade(move |socket| sitzung_fuehren(state, kontext, socket))
}

/// Secret-Raeume nur fuer Teilnehmer bzw. aktive Mitglieder
async fn berechtigung_pruefen(
    state: &AppState,
    art: SitzungsArt,
    raum_id: &str,
    sender_id: &str,
) -> Result<(), Response> {
    if !art.ist_secret() {
        return Ok(());
    }
    let (Ok(raum), Ok(user)) = (raum_id.parse::<ObjektId>(), sender_id.parse::<ObjektId>()) else {
        return Err(fehler_antwort(StatusCode::BAD_REQUEST, "invalid_input", "Ungueltige ID"));
    };

    let zugelassen = match art {
        SitzungsArt::SecretChat => state.secret_chats.ist_teilnehmer(raum, user).await,
        SitzungsArt::SecretGruppe => state.secret_groups.ist_mitglied(raum, user).await,
        SitzungsArt::Chat | SitzungsArt::Gruppe => Ok(true),
    }
    .map_err(chat_fehler)?;

    if zugelassen {
        Ok(())
    } else {
        tracing::warn!(
            raum_id = %raum,
            user_id = %user,
            art = ?art,
            "Live-Verbindung ohne Berechtigung abgelehnt"
        );
        Err(fehler_antwort(StatusCode::FORBIDDEN, "unauthorized", "Kein Teilnehmer dieses Raums"))
    }
}

// ---------------------------------------------------------------------------
// Sitzung
// ---------------------------------------------------------------------------

async fn sitzung_fuehren(state: AppState, kontext: SitzungsKontext, socket: WebSocket) {
    let (mut sink, stream) = socket.split();
    let (verbindung, ausgang) = ClientVerbindung::neu(
        kontext.user_id.clone(),
        state.signaling.config.sende_queue_groesse,
    );

    let sitzung = match Sitzung::beitreten(state.signaling.clone(), kontext, verbindung.clone()) {
        Ok(s) => s,
        Err(e) => {
            ablehnen(&mut sink, &e).await;
            return;
        }
    };

    let schreiber = tokio::spawn(schreib_schleife(sink, ausgang, verbindung.schliess_signal()));

    let eingang = stream
        .take_while(|nachricht| future::ready(!matches!(nachricht, Ok(Message::Close(_)))))
        .filter_map(|nachricht| {
            future::ready(match nachricht {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(_) => None,
                Err(e) => Some(Err(SignalingError::protokoll(e.to_string()))),
            })
        });
    sitzung.ausfuehren(Box::pin(eingang)).await;

    if tokio::time::timeout(SCHREIBER_NACHLAUF, schreiber).await.is_err() {
        tracing::debug!(verbindung = %verbindung.id(), "Schreib-Task endet nicht rechtzeitig");
    }
}

/// Meldet die Ablehnung mit Fehler-Frame und Policy-Close
async fn ablehnen(sink: &mut SplitSink<WebSocket, Message>, fehler: &SignalingError) {
    let _ = sink.send(Message::Text(fehler_frame(fehler))).await;
    let _ = sink
        .send(Message::Close(Some(CloseFrame {
            code: CLOSE_POLICY,
            reason: fehler.code().into(),
        })))
        .await;
}

/// Leert die Send-Queue in den Socket bis zum Schliessen
async fn schreib_schleife(
    mut sink: SplitSink<WebSocket, Message>,
    mut ausgang: mpsc::Receiver<Ausgehend>,
    mut signal: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            element = ausgang.recv() => match element {
                Some(Ausgehend::Text(text)) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(Ausgehend::Schliessen { code, grund }) => {
                    close_senden(&mut sink, code, grund).await;
                    return;
                }
                None => break,
            },

            geaendert = signal.changed() => {
                if geaendert.is_err() || *signal.borrow() {
                    // Bereits eingereihte Frames und Close-Grund noch ausliefern
                    while let Ok(element) = ausgang.try_recv() {
                        match element {
                            Ausgehend::Text(text) => {
                                if sink.send(Message::Text(text)).await.is_err() {
                                    return;
                                }
                            }
                            Ausgehend::Schliessen { code, grund } => {
                                close_senden(&mut sink, code, grund).await;
                                return;
                            }
                        }
                    }
                    close_senden(&mut sink, CLOSE_NORMAL, "Sitzung beendet".into()).await;
                    return;
                }
            }
        }
    }
    let _ = sink.close().await;
}

async fn close_senden(sink: &mut SplitSink<WebSocket, Message>, code: u16, grund: String) {
    let _ = sink
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: grund.into(),
        })))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn mit_origin(origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_str(origin).unwrap());
        headers
    }

    #[test]
    fn origin_aus_liste_erlaubt() {
        let erlaubt = vec!["http://localhost:5000".to_string()];
        assert!(origin_erlaubt(&mit_origin("http://localhost:5000"), &erlaubt));
        assert!(origin_erlaubt(&mit_origin("http://localhost:5000/"), &erlaubt));
        assert!(!origin_erlaubt(&mit_origin("https://boese.example"), &erlaubt));
    }

    #[test]
    fn ohne_origin_abgelehnt() {
        assert!(!origin_erlaubt(&HeaderMap::new(), &["http://a".to_string()]));
        assert!(!origin_erlaubt(&HeaderMap::new(), &["*".to_string()]));
    }

    #[test]
    fn stern_erlaubt_alles() {
        assert!(origin_erlaubt(&mit_origin("https://x.example"), &["*".to_string()]));
    }
}
