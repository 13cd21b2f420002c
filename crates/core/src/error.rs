//! Fehlertypen fuer Hushline
//!
//! Die gemeinsamen Typen koennen nur beim Parsen scheitern. Alle anderen
//! Crates definieren eigene Fehler-Enums.

use thiserror::Error;

/// Fehler der gemeinsamen Typen
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HushlineError {
    #[error("Ungueltige ID: '{0}' (erwartet 24 Hex-Zeichen)")]
    UngueltigeId(String),
}
