//! End-to-End-Tests gegen den vollstaendigen Router
//!
//! WebSocket-Szenarien laufen ueber einen echten Listener auf 127.0.0.1,
//! REST-Szenarien direkt per `oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use hushline_core::{ObjektId, RaumId};
use hushline_crypto::CipherService;
use hushline_db::{models::NeueNachricht, models::Seite, NachrichtenRepository, SqliteDb};
use hushline_server::{app_router, state::AppState};
use hushline_signaling::SignalingConfig;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{
    self, client::IntoClientRequest, http::HeaderValue, Message,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Hilfen
// ---------------------------------------------------------------------------

async fn app_state_mit_worker() -> (AppState, JoinHandle<()>) {
    let db = Arc::new(SqliteDb::in_memory().await.expect("DB erstellen fehlgeschlagen"));
    let cipher = Arc::new(CipherService::neu(b"server-szenario").expect("Cipher fehlgeschlagen"));
    let config = SignalingConfig {
        schreib_timeout_ms: 200,
        ..Default::default()
    };
    AppState::neu(db, cipher, config, vec![ORIGIN.into()]).expect("State aufbauen fehlgeschlagen")
}

async fn app_state() -> AppState {
    app_state_mit_worker().await.0
}

async fn server_starten(state: AppState) -> String {
    let app = app_router(state, true);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Bind fehlgeschlagen");
    let adresse = listener.local_addr().expect("Adresse fehlgeschlagen");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server fehlgeschlagen");
    });
    format!("ws://{adresse}")
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const ORIGIN: &str = "http://localhost:5000";

/// Verbindet wie ein Browser der erlaubten Origin
async fn verbinden(url: String) -> Result<Socket, tungstenite::Error> {
    let mut request = url.into_client_request()?;
    request
        .headers_mut()
        .insert("origin", HeaderValue::from_static(ORIGIN));
    tokio_tungstenite::connect_async(request)
        .await
        .map(|(ws, _)| ws)
}

async fn warten_bis_belegt(state: &AppState, raum: &str, anzahl: usize) {
    let raum = RaumId::neu(raum);
    for _ in 0..100 {
        if state.signaling.hub.mitglieder_anzahl(&raum) == anzahl {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Raum {raum} erreicht nicht {anzahl} Verbindungen");
}

async fn naechste_nachricht<S>(ws: &mut S) -> Message
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("Keine Nachricht innerhalb der Frist")
        .expect("Stream beendet")
        .expect("Lesefehler")
}

async fn anfrage(
    app: &Router,
    methode: &str,
    pfad: &str,
    user: Option<&ObjektId>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(methode).uri(pfad);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_hex());
    }
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Request bauen fehlgeschlagen");

    let antwort = app.clone().oneshot(request).await.expect("Anfrage fehlgeschlagen");
    let status = antwort.status();
    let bytes = axum::body::to_bytes(antwort.into_body(), usize::MAX)
        .await
        .expect("Body lesen fehlgeschlagen");
    let wert = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, wert)
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

#[tokio::test]
async fn paar_chat_ueber_websocket() {
    let state = app_state().await;
    let basis = server_starten(state.clone()).await;

    let mut a = verbinden(format!(
        "{basis}/ws/chats/c1?sender_id=A&receiver_id=B"
    ))
    .await
    .expect("Verbindung A fehlgeschlagen");
    let mut b = verbinden(format!(
        "{basis}/ws/chats/c1?sender_id=B&receiver_id=A"
    ))
    .await
    .expect("Verbindung B fehlgeschlagen");
    warten_bis_belegt(&state, "c1", 2).await;

    a.send(Message::Text(
        json!({"sender_id": "gefaelscht", "content": "hallo"}).to_string(),
    ))
    .await
    .expect("Senden fehlgeschlagen");

    let Message::Text(text) = naechste_nachricht(&mut b).await else {
        panic!("Text-Frame erwartet");
    };
    let frame: Value = serde_json::from_str(&text).expect("Frame ist kein JSON");
    assert_eq!(frame["sender_id"], "A");
    assert_eq!(frame["receiver_id"], "B");
    assert_eq!(frame["content"], "hallo");

    // Dritter Teilnehmer: Fehler-Frame und Policy-Close
    let mut c = verbinden(format!(
        "{basis}/ws/chats/c1?sender_id=C&receiver_id=A"
    ))
    .await
    .expect("Verbindung C fehlgeschlagen");
    let Message::Text(text) = naechste_nachricht(&mut c).await else {
        panic!("Fehler-Frame erwartet");
    };
    let fehler: Value = serde_json::from_str(&text).expect("Fehler-Frame ist kein JSON");
    assert_eq!(fehler["error"], "capacity_exceeded");
    let Message::Close(Some(close)) = naechste_nachricht(&mut c).await else {
        panic!("Close-Frame erwartet");
    };
    assert_eq!(u16::from(close.code), 1008);
    assert_eq!(state.signaling.hub.mitglieder_anzahl(&RaumId::neu("c1")), 2);
}

#[tokio::test]
async fn paar_chat_ohne_empfaenger_abgelehnt() {
    let state = app_state().await;
    let basis = server_starten(state).await;

    let ergebnis = verbinden(format!("{basis}/ws/chats/c1?sender_id=A")).await;
    assert!(ergebnis.is_err());
}

#[tokio::test]
async fn fremde_oder_fehlende_origin_abgelehnt() {
    let state = app_state().await;
    let basis = server_starten(state.clone()).await;
    let url = format!("{basis}/ws/chats/c1?sender_id=A&receiver_id=B");

    // Ohne Origin-Header (kein Browser)
    assert!(tokio_tungstenite::connect_async(url.clone()).await.is_err());

    let mut request = url.clone().into_client_request().expect("Request fehlgeschlagen");
    request
        .headers_mut()
        .insert("origin", HeaderValue::from_static("https://boese.example"));
    assert!(tokio_tungstenite::connect_async(request).await.is_err());

    let _a = verbinden(url).await.expect("Erlaubte Origin wird abgelehnt");
    warten_bis_belegt(&state, "c1", 1).await;
}

#[tokio::test]
async fn secret_chat_nur_fuer_teilnehmer() {
    let state = app_state().await;
    let basis = server_starten(state.clone()).await;
    let (ua, ub) = (ObjektId::neu(), ObjektId::neu());
    let chat = state
        .secret_chats
        .erstellen(ua, ub, None)
        .await
        .expect("Secret-Chat erstellen fehlgeschlagen");

    let fremd = ObjektId::neu();
    let ergebnis = verbinden(format!(
        "{basis}/ws/secret-chats/{}?sender_id={}&receiver_id={}",
        chat.id, fremd, ua
    ))
    .await;
    assert!(ergebnis.is_err());

    let _a = verbinden(format!(
        "{basis}/ws/secret-chats/{}?sender_id={}&receiver_id={}",
        chat.id, ua, ub
    ))
    .await
    .expect("Teilnehmer wird abgelehnt");
    warten_bis_belegt(&state, &chat.id.to_hex(), 1).await;
}

#[tokio::test]
async fn loeschen_trennt_live_teilnehmer() {
    let state = app_state().await;
    let basis = server_starten(state.clone()).await;
    let app = app_router(state.clone(), false);
    let (ua, ub) = (ObjektId::neu(), ObjektId::neu());
    let chat = state
        .secret_chats
        .erstellen(ua, ub, None)
        .await
        .expect("Secret-Chat erstellen fehlgeschlagen");

    let mut a = verbinden(format!(
        "{basis}/ws/secret-chats/{}?sender_id={}&receiver_id={}",
        chat.id, ua, ub
    ))
    .await
    .expect("Verbindung fehlgeschlagen");
    warten_bis_belegt(&state, &chat.id.to_hex(), 1).await;

    let pfad = format!("/v1/secret-chats/{}", chat.id);
    let (status, _) = anfrage(&app, "DELETE", &pfad, Some(&ub), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let Message::Close(Some(close)) = naechste_nachricht(&mut a).await else {
        panic!("Close-Frame erwartet");
    };
    assert_eq!(u16::from(close.code), 4001);
}

// ---------------------------------------------------------------------------
// REST
// ---------------------------------------------------------------------------

#[tokio::test]
async fn secret_chat_handshake_ueber_rest() {
    let state = app_state().await;
    let app = app_router(state, false);
    let (ua, ub) = (ObjektId::neu(), ObjektId::neu());

    let (status, chat) = anfrage(
        &app,
        "POST",
        "/v1/secret-chats",
        Some(&ua),
        Some(json!({"target_user_id": ub.to_hex()})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(chat["zustand"], "erstellt");
    let id = chat["id"].as_str().expect("ID fehlt").to_string();

    // Gleiches Paar in umgekehrter Richtung
    let (status, fehler) = anfrage(
        &app,
        "POST",
        "/v1/secret-chats",
        Some(&ub),
        Some(json!({"target_user_id": ua.to_hex()})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(fehler["error"], "duplicate_chat");

    let schluessel = json!({
        "user_1_encrypted_symmetric_key": "k1",
        "user_2_encrypted_symmetric_key": "k2",
    });
    let (status, fehler) = anfrage(
        &app,
        "PUT",
        &format!("/v1/secret-chats/{id}/symmetric-key"),
        Some(&ua),
        Some(schluessel.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fehler["error"], "public_keys_incomplete");

    for user in [&ua, &ub] {
        let (status, _) = anfrage(
            &app,
            "PUT",
            &format!("/v1/secret-chats/{id}/public-key"),
            Some(user),
            Some(json!({"public_key": format!("pk-{user}")})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, chat) = anfrage(
        &app,
        "PUT",
        &format!("/v1/secret-chats/{id}/symmetric-key"),
        Some(&ub),
        Some(schluessel),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chat["key_finalized"], true);
    assert_eq!(chat["zustand"], "symmetrisch_finalisiert");

    let pfad = format!("/v1/secret-chats/{id}/approve");
    let (status, chat) = anfrage(&app, "POST", &pfad, Some(&ub), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chat["user_2_accepted"], true);

    let fremd = ObjektId::neu();
    let pfad = format!("/v1/secret-chats/{id}");
    let (status, _) = anfrage(&app, "GET", &pfad, Some(&fremd), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rest_ohne_user_header_abgelehnt() {
    let state = app_state().await;
    let app = app_router(state, false);
    let (status, fehler) = anfrage(
        &app,
        "POST",
        "/v1/secret-chats",
        None,
        Some(json!({"target_user_id": ObjektId::neu().to_hex()})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(fehler["error"], "unauthenticated");
}

#[tokio::test]
async fn secret_group_beitritt_ueber_einladung() {
    let state = app_state().await;
    let app = app_router(state, false);
    let (owner, gast) = (ObjektId::neu(), ObjektId::neu());

    let (status, gruppe) = anfrage(
        &app,
        "POST",
        "/v1/secret-groups",
        Some(&owner),
        Some(json!({"name": "Runde", "public_key": "pk-owner"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = gruppe["id"].as_str().expect("ID fehlt").to_string();
    let einladung = gruppe["invite_link"].as_str().expect("Einladung fehlt").to_string();

    let (status, _) = anfrage(
        &app,
        "POST",
        &format!("/v1/secret-groups/join/{einladung}"),
        Some(&gast),
        Some(json!({"public_key": "pk-gast"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, mitglieder) =
        anfrage(&app, "GET", &format!("/v1/secret-groups/{id}/members"), Some(&gast), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mitglieder.as_array().map(Vec::len), Some(2));

    let (status, _) = anfrage(
        &app,
        "POST",
        &format!("/v1/secret-groups/{id}/ban"),
        Some(&owner),
        Some(json!({"user_id": gast.to_hex()})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, fehler) = anfrage(
        &app,
        "POST",
        &format!("/v1/secret-groups/join/{einladung}"),
        Some(&gast),
        Some(json!({"public_key": "pk-gast"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(fehler["error"], "banned");
}

#[tokio::test]
async fn geheime_raeume_des_benutzers_auffindbar() {
    let state = app_state().await;
    let app = app_router(state, false);
    let (ua, ub) = (ObjektId::neu(), ObjektId::neu());

    let (_, chat) = anfrage(
        &app,
        "POST",
        "/v1/secret-chats",
        Some(&ua),
        Some(json!({"target_user_id": ub.to_hex()})),
    )
    .await;

    // Eingeladener findet den Chat ohne die ID zu kennen
    let (status, chats) = anfrage(&app, "GET", "/v1/secret-chats", Some(&ub), None).await;
    assert_eq!(status, StatusCode::OK);
    let chats = chats.as_array().expect("Liste erwartet").clone();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0]["id"], chat["id"]);
    assert_eq!(chats[0]["zustand"], "erstellt");

    let fremd = ObjektId::neu();
    let (_, leer) = anfrage(&app, "GET", "/v1/secret-chats", Some(&fremd), None).await;
    assert_eq!(leer.as_array().map(Vec::len), Some(0));

    let (_, gruppe) = anfrage(
        &app,
        "POST",
        "/v1/secret-groups",
        Some(&ua),
        Some(json!({"name": "Runde", "public_key": "pk-owner"})),
    )
    .await;
    let id = gruppe["id"].as_str().expect("ID fehlt").to_string();
    let einladung = gruppe["invite_link"].as_str().expect("Einladung fehlt").to_string();
    anfrage(
        &app,
        "POST",
        &format!("/v1/secret-groups/join/{einladung}"),
        Some(&ub),
        Some(json!({"public_key": "pk-gast"})),
    )
    .await;

    let (status, gruppen) = anfrage(&app, "GET", "/v1/secret-groups", Some(&ub), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gruppen.as_array().map(Vec::len), Some(1));
    assert_eq!(gruppen[0]["id"], id.as_str());

    // Bann blendet die Gruppe aus, Entbann stellt sie samt Key wieder her
    let ziel = json!({"user_id": ub.to_hex()});
    anfrage(&app, "POST", &format!("/v1/secret-groups/{id}/ban"), Some(&ua), Some(ziel.clone()))
        .await;
    let (_, gruppen) = anfrage(&app, "GET", "/v1/secret-groups", Some(&ub), None).await;
    assert_eq!(gruppen.as_array().map(Vec::len), Some(0));

    let (status, _) =
        anfrage(&app, "POST", &format!("/v1/secret-groups/{id}/unban"), Some(&ua), Some(ziel))
            .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, gruppen) = anfrage(&app, "GET", "/v1/secret-groups", Some(&ub), None).await;
    assert_eq!(gruppen.as_array().map(Vec::len), Some(1));
    assert_eq!(gruppen[0]["user_public_keys"][ub.to_hex()], "pk-gast");
}

#[tokio::test]
async fn shutdown_schreibt_persistenz_queue() {
    let (state, worker) = app_state_mit_worker().await;
    let chat = ObjektId::neu();
    for i in 0..20 {
        state.signaling.persistierer.einreihen(NeueNachricht {
            chat_id: Some(chat),
            sender_id: ObjektId::neu(),
            content: format!("n{i}"),
            ..Default::default()
        });
    }

    assert!(state.persistenz_beenden(worker, Duration::from_secs(2)).await);
    let verlauf = state
        .db
        .chat_verlauf(chat, Seite::neu(1, 50))
        .await
        .expect("Verlauf laden fehlgeschlagen");
    assert_eq!(verlauf.len(), 20);
}

#[tokio::test]
async fn hub_statistik_und_health() {
    let state = app_state().await;
    let app = app_router(state, true);

    let (status, stats) = anfrage(&app, "GET", "/v1/hub/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["statistik"]["benutzer_gesamt"], 0);

    let (status, health) = anfrage(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["db_connected"], true);
    assert_eq!(health["hub"]["connected_users"], 0);

    let antwort = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).expect("Request fehlgeschlagen"))
        .await
        .expect("Anfrage fehlgeschlagen");
    assert_eq!(antwort.status(), StatusCode::OK);
    let text = axum::body::to_bytes(antwort.into_body(), usize::MAX)
        .await
        .expect("Body lesen fehlgeschlagen");
    assert!(String::from_utf8_lossy(&text).contains("hushline_connected_users 0"));
}
