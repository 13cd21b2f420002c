//! Gemeinsame Identifikationstypen fuer Hushline
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.
//!
//! - `UserId` / `RaumId`: Live-Bezeichner aus dem Verbindungsaufbau. Der Hub
//!   behandelt sie als undurchsichtige Strings.
//! - `ObjektId`: 24-stellige Hex-ID fuer persistierte Dokumente
//!   (4 Byte Sekunden-Zeitstempel + 8 Zufallsbytes).

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::HushlineError;

/// Eindeutige Benutzer-ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Erstellt eine UserId aus einem beliebigen String
    pub fn neu(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Gibt den inneren String zurueck
    pub fn als_str(&self) -> &str {
        &self.0
    }

    /// Versucht die ID als persistierte `ObjektId` zu lesen
    pub fn als_objekt_id(&self) -> Result<ObjektId, HushlineError> {
        self.0.parse()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<ObjektId> for UserId {
    fn from(id: ObjektId) -> Self {
        Self(id.to_hex())
    }
}

/// Eindeutige Raum-ID (Chat-ID oder Gruppen-ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaumId(pub String);

impl RaumId {
    /// Erstellt eine RaumId aus einem beliebigen String
    pub fn neu(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Gibt den inneren String zurueck
    pub fn als_str(&self) -> &str {
        &self.0
    }

    /// Versucht die ID als persistierte `ObjektId` zu lesen
    pub fn als_objekt_id(&self) -> Result<ObjektId, HushlineError> {
        self.0.parse()
    }
}

impl fmt::Display for RaumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RaumId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<ObjektId> for RaumId {
    fn from(id: ObjektId) -> Self {
        Self(id.to_hex())
    }
}

/// Laenge einer ObjektId in Bytes
pub const OBJEKT_ID_LAENGE: usize = 12;

/// 12-Byte-Dokument-ID, nach aussen immer als 24 Hex-Zeichen dargestellt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjektId([u8; OBJEKT_ID_LAENGE]);

impl ObjektId {
    /// Erzeugt eine neue ID (Zeitstempel-Praefix, damit IDs grob sortierbar sind)
    pub fn neu() -> Self {
        let mut bytes = [0u8; OBJEKT_ID_LAENGE];
        let sekunden = chrono::Utc::now().timestamp() as u32;
        bytes[..4].copy_from_slice(&sekunden.to_be_bytes());
        OsRng.fill_bytes(&mut bytes[4..]);
        Self(bytes)
    }

    /// Die Null-ID (alle Bytes 0)
    pub const fn null() -> Self {
        Self([0u8; OBJEKT_ID_LAENGE])
    }

    /// Rohbytes der ID
    pub fn bytes(&self) -> &[u8; OBJEKT_ID_LAENGE] {
        &self.0
    }

    /// Hex-Darstellung (24 Zeichen, Kleinbuchstaben)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for ObjektId {
    fn default() -> Self {
        Self::neu()
    }
}

impl fmt::Display for ObjektId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjektId {
    type Err = HushlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != OBJEKT_ID_LAENGE * 2 {
            return Err(HushlineError::UngueltigeId(s.to_string()));
        }
        let mut bytes = [0u8; OBJEKT_ID_LAENGE];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|_| HushlineError::UngueltigeId(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for ObjektId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjektId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
