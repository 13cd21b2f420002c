//! Unit-Tests fuer den VerlaufService

use std::sync::Arc;

use hushline_core::ObjektId;
use hushline_crypto::CipherService;
use hushline_db::models::{NachrichtRecord, NeueNachricht, Seite};
use hushline_db::{NachrichtenRepository, SqliteDb};

use crate::{error::ChatError, verlauf::VerlaufService};

async fn test_db() -> Arc<SqliteDb> {
    Arc::new(SqliteDb::in_memory().await.expect("In-Memory-DB konnte nicht geoeffnet werden"))
}

fn test_cipher() -> Arc<CipherService> {
    Arc::new(CipherService::neu(b"verlauf-test-geheimnis").expect("Cipher erstellen fehlgeschlagen"))
}

async fn speichern(
    db: &SqliteDb,
    cipher: &CipherService,
    chat_id: ObjektId,
    sender: ObjektId,
    empfaenger: ObjektId,
    klartext: &str,
) -> NachrichtRecord {
    db.create(NeueNachricht {
        chat_id: Some(chat_id),
        sender_id: sender,
        receiver_id: Some(empfaenger),
        content: cipher.verschluesseln_hex(klartext).expect("Verschluesseln fehlgeschlagen"),
        ..Default::default()
    })
    .await
    .expect("Nachricht anlegen fehlgeschlagen")
}

#[tokio::test]
async fn test_verlauf_wird_entschluesselt() {
    let (db, cipher) = (test_db().await, test_cipher());
    let service = VerlaufService::neu(db.clone(), cipher.clone());
    let (chat, a, b) = (ObjektId::neu(), ObjektId::neu(), ObjektId::neu());

    speichern(&db, &cipher, chat, a, b, "erste").await;
    speichern(&db, &cipher, chat, b, a, "zweite").await;

    let verlauf = service
        .chat_nachrichten(chat, a, Seite::default())
        .await
        .expect("Verlauf fehlgeschlagen");
    let inhalte: Vec<_> = verlauf.iter().map(|n| n.content.as_str()).collect();
    assert_eq!(inhalte, vec!["erste", "zweite"]);
}

#[tokio::test]
async fn test_defekte_nachricht_wird_ausgeblendet() {
    let (db, cipher) = (test_db().await, test_cipher());
    let service = VerlaufService::neu(db.clone(), cipher.clone());
    let (chat, a, b) = (ObjektId::neu(), ObjektId::neu(), ObjektId::neu());

    db.create(NeueNachricht {
        chat_id: Some(chat),
        sender_id: a,
        receiver_id: Some(b),
        content: "zz-kein-hex".into(),
        content_address: "https://cdn.example/bild.png".into(),
        ..Default::default()
    })
    .await
    .expect("Nachricht anlegen fehlgeschlagen");
    speichern(&db, &cipher, chat, a, b, "intakt").await;

    let verlauf = service
        .chat_nachrichten(chat, b, Seite::default())
        .await
        .expect("Verlauf fehlgeschlagen");
    assert_eq!(verlauf.len(), 2);
    assert_eq!(verlauf[0].content, "");
    assert_eq!(verlauf[0].content_address, "");
    assert_eq!(verlauf[1].content, "intakt");
}

#[tokio::test]
async fn test_soft_delete_nur_fuer_betroffene_seite() {
    let (db, cipher) = (test_db().await, test_cipher());
    let service = VerlaufService::neu(db.clone(), cipher.clone());
    let (chat, a, b) = (ObjektId::neu(), ObjektId::neu(), ObjektId::neu());
    let n = speichern(&db, &cipher, chat, a, b, "hallo").await;

    // Empfaenger darf nicht fuer den Absender loeschen
    let result = service.fuer_sender_loeschen(n.id, b).await;
    assert!(matches!(result, Err(ChatError::NichtAutorisiert(_))));

    service.fuer_empfaenger_loeschen(n.id, b).await.expect("Loeschen fehlgeschlagen");

    let fuer_b = service.chat_nachrichten(chat, b, Seite::default()).await.expect("Verlauf fehlgeschlagen");
    assert_eq!(fuer_b[0].content, "");
    let fuer_a = service.chat_nachrichten(chat, a, Seite::default()).await.expect("Verlauf fehlgeschlagen");
    assert_eq!(fuer_a[0].content, "hallo");
}

#[tokio::test]
async fn test_bearbeiten_nur_eigene_nachricht() {
    let (db, cipher) = (test_db().await, test_cipher());
    let service = VerlaufService::neu(db.clone(), cipher.clone());
    let (chat, a, b) = (ObjektId::neu(), ObjektId::neu(), ObjektId::neu());
    let n = speichern(&db, &cipher, chat, a, b, "tippfeler").await;

    let result = service.nachricht_bearbeiten(n.id, b, "fremd").await;
    assert!(matches!(result, Err(ChatError::NichtAutorisiert(_))));

    let bearbeitet = service
        .nachricht_bearbeiten(n.id, a, "tippfehler")
        .await
        .expect("Bearbeiten fehlgeschlagen");
    assert_eq!(bearbeitet.content, "tippfehler");
    assert!(bearbeitet.edited_at.is_some());

    // In der Datenbank liegt weiterhin Ciphertext
    let roh = db.get(n.id).await.expect("Laden fehlgeschlagen").expect("Nachricht fehlt");
    assert_ne!(roh.content, "tippfehler");
    assert_eq!(cipher.entschluesseln_hex(&roh.content).expect("Entschluesseln fehlgeschlagen"), "tippfehler");
}

#[tokio::test]
async fn test_fuer_alle_loeschen() {
    let (db, cipher) = (test_db().await, test_cipher());
    let service = VerlaufService::neu(db.clone(), cipher.clone());
    let (chat, a, b) = (ObjektId::neu(), ObjektId::neu(), ObjektId::neu());
    let n = speichern(&db, &cipher, chat, a, b, "weg damit").await;

    let result = service.fuer_alle_loeschen(n.id, b).await;
    assert!(matches!(result, Err(ChatError::NichtAutorisiert(_))));

    service.fuer_alle_loeschen(n.id, a).await.expect("Loeschen fehlgeschlagen");
    let verlauf = service.chat_nachrichten(chat, a, Seite::default()).await.expect("Verlauf fehlgeschlagen");
    assert!(verlauf.is_empty());

    let result = service.fuer_alle_loeschen(n.id, a).await;
    assert!(matches!(result, Err(ChatError::NichtGefunden(_))));
}
