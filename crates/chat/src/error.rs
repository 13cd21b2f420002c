//! Fehlertypen fuer das Chat-Crate

use hushline_crypto::CryptoError;
use hushline_db::DbError;
use thiserror::Error;

/// Chat-Fehlertypen
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),

    #[error("Fuer dieses Benutzerpaar existiert bereits ein Secret-Chat")]
    DoppelterChat,

    #[error("Schluessel wurde bereits gesetzt")]
    SchluesselBereitsGesetzt,

    #[error("Beide Public Keys muessen vorhanden sein")]
    PublicKeysUnvollstaendig,

    #[error("Keine Berechtigung: {0}")]
    NichtAutorisiert(String),

    #[error("Benutzer ist in dieser Gruppe gebannt")]
    Gebannt,

    #[error("Benutzer ist bereits Mitglied")]
    BereitsMitglied,

    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    #[error("Speicher nicht verfuegbar: {0}")]
    SpeicherNichtVerfuegbar(String),

    #[error("Datenbank-Fehler: {0}")]
    Datenbank(DbError),

    #[error("Krypto-Fehler: {0}")]
    Krypto(#[from] CryptoError),
}

impl From<DbError> for ChatError {
    fn from(e: DbError) -> Self {
        if e.ist_nicht_verfuegbar() {
            Self::SpeicherNichtVerfuegbar(e.to_string())
        } else {
            Self::Datenbank(e)
        }
    }
}

impl ChatError {
    pub fn nicht_gefunden(was: impl Into<String>) -> Self {
        Self::NichtGefunden(was.into())
    }

    pub fn nicht_autorisiert(grund: impl Into<String>) -> Self {
        Self::NichtAutorisiert(grund.into())
    }

    /// HTTP-Statuscode fuer die REST-Schicht
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NichtGefunden(_) => 404,
            Self::DoppelterChat
            | Self::SchluesselBereitsGesetzt
            | Self::BereitsMitglied => 409,
            Self::PublicKeysUnvollstaendig | Self::UngueltigeEingabe(_) => 400,
            Self::NichtAutorisiert(_) | Self::Gebannt => 403,
            Self::SpeicherNichtVerfuegbar(_) => 503,
            Self::Datenbank(_) | Self::Krypto(_) => 500,
        }
    }

    /// Maschinenlesbarer Fehlercode
    pub fn code(&self) -> &'static str {
        match self {
            Self::NichtGefunden(_) => "not_found",
            Self::DoppelterChat => "duplicate_chat",
            Self::SchluesselBereitsGesetzt => "key_already_set",
            Self::PublicKeysUnvollstaendig => "public_keys_incomplete",
            Self::NichtAutorisiert(_) => "unauthorized",
            Self::Gebannt => "banned",
            Self::BereitsMitglied => "already_member",
            Self::UngueltigeEingabe(_) => "invalid_input",
            Self::SpeicherNichtVerfuegbar(_) => "store_unavailable",
            Self::Datenbank(_) => "database_error",
            Self::Krypto(_) => "crypto_error",
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
