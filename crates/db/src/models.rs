//! Datenbankmodelle fuer Hushline
//!
//! Diese Typen repraesentieren Datensaetze aus der Datenbank.
//! Sie sind von den Wire-Envelopes der Signaling-Schicht getrennt.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use hushline_core::ObjektId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Nachrichten
// ---------------------------------------------------------------------------

/// Art des Nachrichteninhalts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InhaltsTyp {
    #[default]
    Text,
    Image,
}

impl InhaltsTyp {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }
}

impl FromStr for InhaltsTyp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            other => Err(format!("Unbekannter Inhaltstyp: '{other}'")),
        }
    }
}

/// Nachrichten-Datensatz
///
/// `content` ist bei regulaeren Nachrichten hex-kodierter Server-Ciphertext,
/// bei Secret-Nachrichten der unveraenderte Client-Ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NachrichtRecord {
    pub id: ObjektId,
    pub chat_id: Option<ObjektId>,
    pub group_id: Option<ObjektId>,
    pub sender_id: ObjektId,
    pub receiver_id: Option<ObjektId>,
    pub content_type: InhaltsTyp,
    pub content: String,
    pub content_address: String,
    pub is_secret: bool,
    pub is_deleted_for_sender: bool,
    pub is_deleted_for_receiver: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NachrichtRecord {
    /// Ob die Nachricht fuer `user` ausgeblendet werden muss
    pub fn ist_geloescht_fuer(&self, user: &ObjektId) -> bool {
        (self.is_deleted_for_sender && &self.sender_id == user)
            || (self.is_deleted_for_receiver && self.receiver_id.as_ref() == Some(user))
    }
}

/// Daten zum Anlegen einer Nachricht
///
/// Owned, weil die Persistenz-Pipeline die Daten an einen Worker-Task uebergibt.
#[derive(Debug, Clone, Default)]
pub struct NeueNachricht {
    pub chat_id: Option<ObjektId>,
    pub group_id: Option<ObjektId>,
    pub sender_id: ObjektId,
    pub receiver_id: Option<ObjektId>,
    pub content_type: InhaltsTyp,
    pub content: String,
    pub content_address: String,
    pub is_secret: bool,
    /// Vorgegebener Zeitstempel, sonst der Zeitpunkt des Einfuegens
    pub created_at: Option<DateTime<Utc>>,
}

/// Seitenangabe fuer Verlaufsabfragen (Seiten beginnen bei 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seite {
    pub page: u32,
    pub limit: u32,
}

impl Seite {
    pub fn neu(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, 200),
        }
    }

    pub(crate) fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

impl Default for Seite {
    fn default() -> Self {
        Self { page: 1, limit: 50 }
    }
}

// ---------------------------------------------------------------------------
// Secret-Chats
// ---------------------------------------------------------------------------

/// Ende-zu-Ende verschluesselter 1:1-Chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretChatRecord {
    pub id: ObjektId,
    pub user_1: ObjektId,
    pub user_2: ObjektId,
    pub user_1_public_key: String,
    pub user_2_public_key: String,
    pub user_1_encrypted_symmetric_key: String,
    pub user_2_encrypted_symmetric_key: String,
    pub user_2_accepted: bool,
    pub key_finalized: bool,
    pub expire_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SecretChatRecord {
    pub fn ist_teilnehmer(&self, user: &ObjektId) -> bool {
        &self.user_1 == user || &self.user_2 == user
    }

    pub fn public_keys_vollstaendig(&self) -> bool {
        !self.user_1_public_key.is_empty() && !self.user_2_public_key.is_empty()
    }

    pub fn ist_abgelaufen(&self, jetzt: DateTime<Utc>) -> bool {
        self.expire_at.is_some_and(|t| t <= jetzt)
    }

    /// Der jeweils andere Teilnehmer
    pub fn gegenueber(&self, user: &ObjektId) -> Option<ObjektId> {
        if &self.user_1 == user {
            Some(self.user_2)
        } else if &self.user_2 == user {
            Some(self.user_1)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Secret-Groups
// ---------------------------------------------------------------------------

/// Sichtbarkeit einer Gruppe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GruppenTyp {
    Public,
    #[default]
    Private,
}

impl GruppenTyp {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl FromStr for GruppenTyp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            other => Err(format!("Unbekannter Gruppentyp: '{other}'")),
        }
    }
}

/// Status einer Zeile in `secret_group_members`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MitgliedStatus {
    Member,
    Banned,
}

impl MitgliedStatus {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Banned => "banned",
        }
    }
}

impl FromStr for MitgliedStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(Self::Member),
            "banned" => Ok(Self::Banned),
            other => Err(format!("Unbekannter Mitgliedsstatus: '{other}'")),
        }
    }
}

/// Mitgliedschaft eines Benutzers in einer Secret-Group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretGroupMitglied {
    pub group_id: ObjektId,
    pub user_id: ObjektId,
    pub status: MitgliedStatus,
    pub is_admin: bool,
    pub public_key: String,
    pub joined_at: DateTime<Utc>,
}

/// Zusammengesetzte Sicht auf eine Secret-Group inklusive Mitgliedschaften
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretGroupRecord {
    pub id: ObjektId,
    pub owner_id: ObjektId,
    pub name: String,
    pub description: String,
    pub group_type: GruppenTyp,
    pub invite_link: String,
    pub admins: Vec<ObjektId>,
    pub members: Vec<ObjektId>,
    pub banned_members: Vec<ObjektId>,
    /// userId -> publicKey
    pub user_public_keys: BTreeMap<String, String>,
    /// userId -> Beitrittszeit
    pub join_times: BTreeMap<String, DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SecretGroupRecord {
    pub fn ist_mitglied(&self, user: &ObjektId) -> bool {
        self.members.contains(user)
    }

    pub fn ist_admin(&self, user: &ObjektId) -> bool {
        self.admins.contains(user)
    }

    pub fn ist_gebannt(&self, user: &ObjektId) -> bool {
        self.banned_members.contains(user)
    }
}

/// Daten zum Anlegen einer Secret-Group
#[derive(Debug, Clone)]
pub struct NeueSecretGroup {
    pub owner_id: ObjektId,
    pub owner_public_key: String,
    pub name: String,
    pub description: String,
    pub group_type: GruppenTyp,
    pub invite_link: String,
}

/// Ergebnis eines Beitrittsversuchs
#[derive(Debug, Clone)]
pub enum BeitrittsErgebnis {
    Beigetreten(SecretGroupMitglied),
    BereitsMitglied,
    Gebannt,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nachricht(sender: ObjektId, empfaenger: ObjektId) -> NachrichtRecord {
        NachrichtRecord {
            id: ObjektId::neu(),
            chat_id: Some(ObjektId::neu()),
            group_id: None,
            sender_id: sender,
            receiver_id: Some(empfaenger),
            content_type: InhaltsTyp::Text,
            content: String::new(),
            content_address: String::new(),
            is_secret: false,
            is_deleted_for_sender: false,
            is_deleted_for_receiver: false,
            edited_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn geloescht_fuer_sender_betrifft_nur_sender() {
        let a = ObjektId::neu();
        let b = ObjektId::neu();
        let mut n = nachricht(a, b);
        n.is_deleted_for_sender = true;
        assert!(n.ist_geloescht_fuer(&a));
        assert!(!n.ist_geloescht_fuer(&b));
    }

    #[test]
    fn geloescht_fuer_empfaenger_betrifft_nur_empfaenger() {
        let a = ObjektId::neu();
        let b = ObjektId::neu();
        let mut n = nachricht(a, b);
        n.is_deleted_for_receiver = true;
        assert!(!n.ist_geloescht_fuer(&a));
        assert!(n.ist_geloescht_fuer(&b));
    }

    #[test]
    fn seite_offset_und_grenzen() {
        assert_eq!(Seite::neu(1, 20).offset(), 0);
        assert_eq!(Seite::neu(3, 20).offset(), 40);
        assert_eq!(Seite::neu(0, 0), Seite { page: 1, limit: 1 });
        assert_eq!(Seite::neu(1, 10_000).limit, 200);
    }

    #[test]
    fn inhaltstyp_parsen() {
        assert_eq!("image".parse::<InhaltsTyp>().unwrap(), InhaltsTyp::Image);
        assert!("video".parse::<InhaltsTyp>().is_err());
    }
}
