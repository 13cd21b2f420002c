//! Wire-Envelope fuer Chat- und Gruppen-Frames
//!
//! ```json
//! // Chat
//! {"sender_id": "...", "receiver_id": "...", "content": "...",
//!  "content_address": "...", "content_type": "text"}
//! // Gruppe
//! {"sender_id": "...", "content": "...", "content_address": "...", "content_type": "image"}
//! // Secret-Group zusaetzlich
//! {"users_symmetric_keys": {"<userId>": "<wrappedKey>"}}
//! ```
//!
//! Unbekannte Felder werden unveraendert weitergereicht.

use std::collections::BTreeMap;

use hushline_core::UserId;
use hushline_db::models::InhaltsTyp;
use serde::{Deserialize, Serialize};

use crate::error::{SignalingError, SignalingResult};

/// Eingehender bzw. ausgehender Nachrichten-Frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub content_address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// userId -> gewrappter Gruppenschluessel (nur Secret-Groups)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_symmetric_keys: Option<BTreeMap<String, String>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Envelope {
    /// Parst einen Text-Frame; nur JSON-Objekte sind gueltig
    pub fn parsen(text: &str) -> SignalingResult<Self> {
        let wert: serde_json::Value = serde_json::from_str(text)?;
        if !wert.is_object() {
            return Err(SignalingError::protokoll("Frame ist kein JSON-Objekt"));
        }
        Ok(serde_json::from_value(wert)?)
    }

    /// Ueberschreibt Absender (und ggf. Empfaenger) mit den Werten der Sitzung
    ///
    /// Was der Client selbst in diese Felder schreibt, wird ignoriert.
    pub fn stempeln(&mut self, sender: &UserId, empfaenger: Option<&UserId>) {
        self.sender_id = Some(sender.to_string());
        self.receiver_id = empfaenger.map(UserId::to_string);
    }

    /// Inhaltstyp fuer die Persistenz; Unbekanntes gilt als Text
    pub fn inhalts_typ(&self) -> InhaltsTyp {
        self.content_type
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or_default()
    }

    pub fn serialisieren(&self) -> SignalingResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
