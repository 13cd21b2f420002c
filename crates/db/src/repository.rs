//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt die Geschaeftslogik von der konkreten
//! Datenbank-Implementierung. Die Traits nutzen `async_trait`, damit die
//! Futures `Send` sind: Verbindungs-Tasks laufen auf der Multi-Thread-Runtime
//! und rufen die Repositories direkt auf.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hushline_core::ObjektId;

use crate::error::DbError;
use crate::models::{
    BeitrittsErgebnis, NachrichtRecord, NeueNachricht, NeueSecretGroup, SecretChatRecord,
    SecretGroupMitglied, SecretGroupRecord, Seite,
};

/// Ergebnis-Alias fuer alle Repository-Operationen
pub type DbResult<T> = Result<T, DbError>;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://hushline.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus bei SQLite aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://hushline.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Nachrichten
// ---------------------------------------------------------------------------

#[async_trait]
pub trait NachrichtenRepository: Send + Sync {
    /// Legt eine Nachricht an (Inhalt wird unveraendert gespeichert)
    async fn create(&self, daten: NeueNachricht) -> DbResult<NachrichtRecord>;

    async fn get(&self, id: ObjektId) -> DbResult<Option<NachrichtRecord>>;

    /// Verlauf eines 1:1-Chats, aelteste zuerst
    async fn chat_verlauf(&self, chat_id: ObjektId, seite: Seite)
        -> DbResult<Vec<NachrichtRecord>>;

    /// Verlauf einer Gruppe, aelteste zuerst
    async fn gruppen_verlauf(
        &self,
        group_id: ObjektId,
        seite: Seite,
    ) -> DbResult<Vec<NachrichtRecord>>;

    /// Ersetzt den (bereits verschluesselten) Inhalt und setzt `edited_at`
    async fn update_content(&self, id: ObjektId, content: &str) -> DbResult<NachrichtRecord>;

    /// Setzt `is_deleted_for_sender`, nur wenn `sender` der Absender ist
    async fn fuer_sender_markieren(&self, id: ObjektId, sender: ObjektId) -> DbResult<bool>;

    /// Setzt `is_deleted_for_receiver`, nur wenn `empfaenger` der Empfaenger ist
    async fn fuer_empfaenger_markieren(&self, id: ObjektId, empfaenger: ObjektId)
        -> DbResult<bool>;

    async fn delete(&self, id: ObjektId) -> DbResult<bool>;

    /// Loescht alle Nachrichten eines Chats, gibt die Anzahl zurueck
    async fn chat_nachrichten_loeschen(&self, chat_id: ObjektId) -> DbResult<u64>;
}

// ---------------------------------------------------------------------------
// Secret-Chats
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SecretChatRepository: Send + Sync {
    /// Legt einen Chat an. `DbError::Eindeutigkeit`, wenn fuer das
    /// ungeordnete Paar bereits ein Chat existiert.
    async fn create(
        &self,
        user_1: ObjektId,
        user_2: ObjektId,
        expire_at: Option<DateTime<Utc>>,
    ) -> DbResult<SecretChatRecord>;

    /// Laedt einen Chat; abgelaufene Chats gelten als nicht vorhanden
    async fn get(&self, id: ObjektId) -> DbResult<Option<SecretChatRecord>>;

    /// Alle nicht abgelaufenen Chats, an denen `user` beteiligt ist
    async fn fuer_teilnehmer(&self, user: ObjektId) -> DbResult<Vec<SecretChatRecord>>;

    /// Setzt den Public Key des Teilnehmers, falls er noch leer ist.
    /// `false`, wenn der Key bereits gesetzt war oder `user` kein Teilnehmer ist.
    async fn public_key_setzen(&self, id: ObjektId, user: ObjektId, key: &str)
        -> DbResult<bool>;

    /// Setzt beide gewrappten Schluessel und `key_finalized`, sofern beide
    /// Public Keys vorhanden sind und noch nicht finalisiert wurde.
    async fn symmetrische_keys_setzen(
        &self,
        id: ObjektId,
        user_1_key: &str,
        user_2_key: &str,
    ) -> DbResult<bool>;

    async fn akzeptieren(&self, id: ObjektId) -> DbResult<bool>;

    /// Loescht den Chat samt aller Nachrichten (eine Transaktion)
    async fn delete(&self, id: ObjektId) -> DbResult<bool>;
}

// ---------------------------------------------------------------------------
// Secret-Groups
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SecretGroupRepository: Send + Sync {
    /// Legt die Gruppe an; der Owner wird im selben Schritt Mitglied und Admin
    async fn create(&self, daten: NeueSecretGroup) -> DbResult<SecretGroupRecord>;

    async fn get(&self, id: ObjektId) -> DbResult<Option<SecretGroupRecord>>;

    async fn get_nach_einladung(&self, invite_link: &str) -> DbResult<Option<SecretGroupRecord>>;

    /// Alle Gruppen, in denen `user` aktives Mitglied ist
    async fn fuer_mitglied(&self, user: ObjektId) -> DbResult<Vec<SecretGroupRecord>>;

    /// Mitgliedschaft, Beitrittszeit und Public Key in einer Operation
    async fn beitreten(
        &self,
        group_id: ObjektId,
        user_id: ObjektId,
        public_key: &str,
    ) -> DbResult<BeitrittsErgebnis>;

    async fn mitglied(
        &self,
        group_id: ObjektId,
        user_id: ObjektId,
    ) -> DbResult<Option<SecretGroupMitglied>>;

    /// Alle aktiven Mitglieder (ohne Gebannte)
    async fn mitglieder(&self, group_id: ObjektId) -> DbResult<Vec<SecretGroupMitglied>>;

    /// Entfernt ein aktives Mitglied
    async fn mitglied_entfernen(&self, group_id: ObjektId, user_id: ObjektId) -> DbResult<bool>;

    /// Verschiebt den Benutzer nach `banned` (auch wenn er nie Mitglied war).
    /// Ein vorhandener Public Key bleibt erhalten.
    async fn bannen(&self, group_id: ObjektId, user_id: ObjektId) -> DbResult<()>;

    /// Verschiebt einen gebannten Benutzer samt Public Key zurueck nach
    /// `member`. Wer nie einen Key hinterlegt hat, wird nur aus der Bannliste
    /// entfernt und muss ueber den Einladungslink neu beitreten.
    async fn entbannen(&self, group_id: ObjektId, user_id: ObjektId) -> DbResult<bool>;

    /// Loescht die Gruppe, ihre Mitgliedschaften und Nachrichten
    async fn delete(&self, id: ObjektId) -> DbResult<bool>;
}
