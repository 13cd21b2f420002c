//! Unit-Tests fuer den SecretGroupService

use std::sync::Arc;

use hushline_core::ObjektId;
use hushline_db::models::{GruppenTyp, SecretGroupRecord, Seite};
use hushline_db::SqliteDb;

use crate::{error::ChatError, secret_group::SecretGroupService, types::SecretGroupAnfrage};

async fn test_db() -> Arc<SqliteDb> {
    Arc::new(SqliteDb::in_memory().await.expect("In-Memory-DB konnte nicht geoeffnet werden"))
}

fn anfrage(name: &str) -> SecretGroupAnfrage {
    SecretGroupAnfrage {
        name: name.to_string(),
        description: "Testgruppe".into(),
        group_type: GruppenTyp::Private,
        public_key: "pk-owner".into(),
    }
}

async fn setup_gruppe(service: &SecretGroupService<SqliteDb>) -> (SecretGroupRecord, ObjektId) {
    let owner = ObjektId::neu();
    let gruppe = service
        .erstellen(owner, anfrage("geheimzirkel"))
        .await
        .expect("Gruppe erstellen fehlgeschlagen");
    (gruppe, owner)
}

#[tokio::test]
async fn test_erstellen_owner_ist_admin_und_mitglied() {
    let service = SecretGroupService::neu(test_db().await);
    let (gruppe, owner) = setup_gruppe(&service).await;

    assert_eq!(gruppe.owner_id, owner);
    assert!(gruppe.ist_admin(&owner));
    assert!(gruppe.ist_mitglied(&owner));
    assert_eq!(gruppe.user_public_keys.get(&owner.to_hex()).map(String::as_str), Some("pk-owner"));
    assert!(!gruppe.invite_link.is_empty());
}

#[tokio::test]
async fn test_erstellen_ohne_public_key_abgelehnt() {
    let service = SecretGroupService::neu(test_db().await);
    let mut a = anfrage("gruppe");
    a.public_key = String::new();
    let result = service.erstellen(ObjektId::neu(), a).await;
    assert!(matches!(result, Err(ChatError::UngueltigeEingabe(_))));

    let result = service.erstellen(ObjektId::neu(), anfrage("   ")).await;
    assert!(matches!(result, Err(ChatError::UngueltigeEingabe(_))));
}

#[tokio::test]
async fn test_beitreten_ueber_einladung() {
    let service = SecretGroupService::neu(test_db().await);
    let (gruppe, owner) = setup_gruppe(&service).await;
    let user = ObjektId::neu();

    let mitglied = service
        .beitreten(&gruppe.invite_link, user, "pk-user")
        .await
        .expect("Beitritt fehlgeschlagen");
    assert_eq!(mitglied.user_id, user);
    assert_eq!(mitglied.public_key, "pk-user");
    assert!(!mitglied.is_admin);

    let gruppe = service.laden(gruppe.id, owner).await.expect("Laden fehlgeschlagen");
    assert!(gruppe.ist_mitglied(&user));
    assert!(gruppe.join_times.contains_key(&user.to_hex()));

    let result = service.beitreten(&gruppe.invite_link, user, "pk-user").await;
    assert!(matches!(result, Err(ChatError::BereitsMitglied)));
}

#[tokio::test]
async fn test_beitreten_mit_unbekannter_einladung() {
    let service = SecretGroupService::neu(test_db().await);
    let result = service.beitreten("gibt-es-nicht", ObjektId::neu(), "pk").await;
    assert!(matches!(result, Err(ChatError::NichtGefunden(_))));
}

#[tokio::test]
async fn test_bann_verhindert_beitritt_bis_entbann() {
    let service = SecretGroupService::neu(test_db().await);
    let (gruppe, owner) = setup_gruppe(&service).await;
    let user = ObjektId::neu();
    service
        .beitreten(&gruppe.invite_link, user, "pk-user")
        .await
        .expect("Beitritt fehlgeschlagen");

    service.bannen(gruppe.id, owner, user).await.expect("Bannen fehlgeschlagen");
    let g = service.laden(gruppe.id, owner).await.expect("Laden fehlgeschlagen");
    assert!(g.ist_gebannt(&user));
    assert!(!g.ist_mitglied(&user));
    assert!(!service.ist_mitglied(gruppe.id, user).await.expect("Pruefung fehlgeschlagen"));

    let result = service.beitreten(&gruppe.invite_link, user, "pk-user").await;
    assert!(matches!(result, Err(ChatError::Gebannt)));

    service.entbannen(gruppe.id, owner, user).await.expect("Entbannen fehlgeschlagen");
    assert!(service.ist_mitglied(gruppe.id, user).await.expect("Pruefung fehlgeschlagen"));

    // Entbanntes Mitglied bleibt fuer das Wrappen des Gruppenschluessels erreichbar
    let mitglieder = service
        .mitglieder(gruppe.id, owner)
        .await
        .expect("Mitglieder laden fehlgeschlagen");
    let eintrag = mitglieder
        .iter()
        .find(|m| m.user_id == user)
        .expect("Entbanntes Mitglied fehlt");
    assert_eq!(eintrag.public_key, "pk-user");
}

#[tokio::test]
async fn test_gruppen_des_benutzers() {
    let service = SecretGroupService::neu(test_db().await);
    let (gruppe, owner) = setup_gruppe(&service).await;
    let user = ObjektId::neu();

    assert!(service
        .fuer_benutzer(user)
        .await
        .expect("Gruppen laden fehlgeschlagen")
        .is_empty());

    service
        .beitreten(&gruppe.invite_link, user, "pk-user")
        .await
        .expect("Beitritt fehlgeschlagen");
    let gruppen = service.fuer_benutzer(user).await.expect("Gruppen laden fehlgeschlagen");
    assert_eq!(gruppen.len(), 1);
    assert_eq!(gruppen[0].id, gruppe.id);

    service.bannen(gruppe.id, owner, user).await.expect("Bannen fehlgeschlagen");
    assert!(service
        .fuer_benutzer(user)
        .await
        .expect("Gruppen laden fehlgeschlagen")
        .is_empty());
}

#[tokio::test]
async fn test_bannen_nur_durch_admins() {
    let service = SecretGroupService::neu(test_db().await);
    let (gruppe, owner) = setup_gruppe(&service).await;
    let (a, b) = (ObjektId::neu(), ObjektId::neu());
    for u in [a, b] {
        service
            .beitreten(&gruppe.invite_link, u, "pk")
            .await
            .expect("Beitritt fehlgeschlagen");
    }

    let result = service.bannen(gruppe.id, a, b).await;
    assert!(matches!(result, Err(ChatError::NichtAutorisiert(_))));

    let result = service.bannen(gruppe.id, owner, owner).await;
    assert!(matches!(result, Err(ChatError::UngueltigeEingabe(_))));
}

#[tokio::test]
async fn test_entbannen_ohne_bann() {
    let service = SecretGroupService::neu(test_db().await);
    let (gruppe, owner) = setup_gruppe(&service).await;
    let result = service.entbannen(gruppe.id, owner, ObjektId::neu()).await;
    assert!(matches!(result, Err(ChatError::NichtGefunden(_))));
}

#[tokio::test]
async fn test_verlassen_und_entfernen() {
    let service = SecretGroupService::neu(test_db().await);
    let (gruppe, owner) = setup_gruppe(&service).await;
    let (a, b) = (ObjektId::neu(), ObjektId::neu());
    for u in [a, b] {
        service
            .beitreten(&gruppe.invite_link, u, "pk")
            .await
            .expect("Beitritt fehlgeschlagen");
    }

    let result = service.verlassen(gruppe.id, owner).await;
    assert!(matches!(result, Err(ChatError::NichtAutorisiert(_))));

    service.verlassen(gruppe.id, a).await.expect("Verlassen fehlgeschlagen");
    assert!(!service.ist_mitglied(gruppe.id, a).await.expect("Pruefung fehlgeschlagen"));

    let result = service.mitglied_entfernen(gruppe.id, b, owner).await;
    assert!(matches!(result, Err(ChatError::NichtAutorisiert(_))));

    service
        .mitglied_entfernen(gruppe.id, owner, b)
        .await
        .expect("Entfernen fehlgeschlagen");
    let mitglieder = service.mitglieder(gruppe.id, owner).await.expect("Mitglieder fehlgeschlagen");
    assert_eq!(mitglieder.len(), 1);
    assert_eq!(mitglieder[0].user_id, owner);
}

#[tokio::test]
async fn test_mitglieder_nur_fuer_mitglieder() {
    let service = SecretGroupService::neu(test_db().await);
    let (gruppe, _owner) = setup_gruppe(&service).await;

    let result = service.mitglieder(gruppe.id, ObjektId::neu()).await;
    assert!(matches!(result, Err(ChatError::NichtAutorisiert(_))));
    let result = service.nachrichten(gruppe.id, ObjektId::neu(), Seite::default()).await;
    assert!(matches!(result, Err(ChatError::NichtAutorisiert(_))));
}

#[tokio::test]
async fn test_loeschen_nur_durch_owner() {
    let service = SecretGroupService::neu(test_db().await);
    let (gruppe, owner) = setup_gruppe(&service).await;
    let user = ObjektId::neu();
    service
        .beitreten(&gruppe.invite_link, user, "pk")
        .await
        .expect("Beitritt fehlgeschlagen");

    let result = service.loeschen(gruppe.id, user).await;
    assert!(matches!(result, Err(ChatError::NichtAutorisiert(_))));

    service.loeschen(gruppe.id, owner).await.expect("Loeschen fehlgeschlagen");
    let result = service.laden(gruppe.id, owner).await;
    assert!(matches!(result, Err(ChatError::NichtGefunden(_))));
}
