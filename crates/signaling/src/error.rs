//! Fehlertypen fuer Hub, Broadcast und Sitzungen

use hushline_core::{RaumId, UserId};
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Raum ist bereits voll belegt
    #[error("Raum {raum_id} ist voll (Kapazitaet {kapazitaet})")]
    KapazitaetUeberschritten { raum_id: RaumId, kapazitaet: usize },

    /// Raum hat keine Teilnehmer
    #[error("Raum nicht gefunden: {0}")]
    RaumNichtGefunden(RaumId),

    /// Verbindung wurde getrennt oder geschlossen
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Schreibfrist fuer einen Empfaenger abgelaufen
    #[error("Timeout beim Senden")]
    Timeout,

    /// Einzelne Empfaenger konnten nicht beliefert werden
    #[error("Broadcast an {} von {} Empfaengern fehlgeschlagen", fehlgeschlagen.len(), fehlgeschlagen.len() + *zugestellt)]
    TeilweiseFehlgeschlagen {
        zugestellt: usize,
        fehlgeschlagen: Vec<(UserId, String)>,
    },

    /// Protokollfehler (ungueltiges Frame)
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Persistenz-Pipeline nicht mehr verfuegbar
    #[error("Persistenz nicht verfuegbar")]
    PersistenzGeschlossen,

    /// JSON-Fehler beim (De-)Serialisieren eines Frames
    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }

    /// Maschinenlesbarer Code fuer Fehler-Frames an den Client
    pub fn code(&self) -> &'static str {
        match self {
            Self::KapazitaetUeberschritten { .. } => "capacity_exceeded",
            Self::RaumNichtGefunden(_) => "room_not_found",
            Self::VerbindungGetrennt => "connection_closed",
            Self::Timeout => "timeout",
            Self::TeilweiseFehlgeschlagen { .. } => "partial_delivery",
            Self::Protokoll(_) | Self::Json(_) => "invalid_frame",
            Self::PersistenzGeschlossen => "store_unavailable",
            Self::Intern(_) => "internal_error",
        }
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
