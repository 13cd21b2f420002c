//! Fehlertypen fuer das Kryptografie-Subsystem

use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Ungueltiger Ciphertext: {laenge} Bytes, mindestens {minimum} erwartet")]
    UngueltigerCiphertext { laenge: usize, minimum: usize },

    #[error("Authentifizierung fehlgeschlagen (falscher Schluessel oder manipulierte Daten)")]
    AuthentifizierungFehlgeschlagen,

    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    #[error("Ungueltige Daten: {0}")]
    UngueltigeDaten(String),

    #[error("Schluesselmaterial fehlt oder ist leer")]
    LeeresGeheimnis,

    #[error("Hex-Dekodierung fehlgeschlagen: {0}")]
    Hex(#[from] hex::FromHexError),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
