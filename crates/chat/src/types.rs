//! Anfrage- und Antworttypen der Chat-Services

use chrono::{DateTime, Utc};
use hushline_core::ObjektId;
use hushline_db::models::{GruppenTyp, SecretChatRecord};
use serde::{Deserialize, Serialize};

/// Zustand des Secret-Chat-Handshakes
///
/// ```text
/// Erstellt -> PublicKeysAusstehend -> PublicKeysVollstaendig -> SymmetrischFinalisiert
/// ```
/// Die Annahme durch Teilnehmer 2 laeuft orthogonal dazu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeZustand {
    Erstellt,
    PublicKeysAusstehend,
    PublicKeysVollstaendig,
    SymmetrischFinalisiert,
}

impl HandshakeZustand {
    pub fn von(chat: &SecretChatRecord) -> Self {
        if chat.key_finalized {
            Self::SymmetrischFinalisiert
        } else if chat.public_keys_vollstaendig() {
            Self::PublicKeysVollstaendig
        } else if !chat.user_1_public_key.is_empty() || !chat.user_2_public_key.is_empty() {
            Self::PublicKeysAusstehend
        } else {
            Self::Erstellt
        }
    }
}

/// Anlegen eines Secret-Chats
#[derive(Debug, Clone, Deserialize)]
pub struct SecretChatAnfrage {
    pub target_user_id: ObjektId,
    #[serde(default)]
    pub expire_at: Option<DateTime<Utc>>,
}

/// Upload eines Public Keys
#[derive(Debug, Clone, Deserialize)]
pub struct PublicKeyAnfrage {
    pub public_key: String,
}

/// Upload der fuer beide Teilnehmer gewrappten Schluessel
#[derive(Debug, Clone, Deserialize)]
pub struct SymmetrischeSchluesselAnfrage {
    pub user_1_encrypted_symmetric_key: String,
    pub user_2_encrypted_symmetric_key: String,
}

/// Anlegen einer Secret-Group
#[derive(Debug, Clone, Deserialize)]
pub struct SecretGroupAnfrage {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub group_type: GruppenTyp,
    /// Public Key des Owners
    pub public_key: String,
}

/// Ziel einer Moderationsaktion (Bann, Entbann)
#[derive(Debug, Clone, Deserialize)]
pub struct MitgliedAnfrage {
    pub user_id: ObjektId,
}

/// Sicht auf einen Secret-Chat inklusive Handshake-Zustand
#[derive(Debug, Clone, Serialize)]
pub struct SecretChatAnsicht {
    #[serde(flatten)]
    pub chat: SecretChatRecord,
    pub zustand: HandshakeZustand,
}

impl From<SecretChatRecord> for SecretChatAnsicht {
    fn from(chat: SecretChatRecord) -> Self {
        let zustand = HandshakeZustand::von(&chat);
        Self { chat, zustand }
    }
}
