//! Cipher-Service fuer Nachrichteninhalte at rest
//!
//! ## Format
//! ```text
//! [nonce(12)] [ciphertext + auth_tag(16)]
//! ```
//!
//! Der Schluessel ist SHA-256 ueber das konfigurierte Geheimnis, die Laenge
//! des Geheimnisses ist damit beliebig. Jeder Aufruf von `verschluesseln`
//! zieht eine frische Zufalls-Nonce, identische Klartexte ergeben also
//! unterschiedliche Ciphertexte.
//!
//! In der Datenbank liegt der Ciphertext hex-kodiert (`verschluesseln_hex`).

use std::fmt;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};

/// Laenge der Nonce-Praefix in Bytes
pub const NONCE_LAENGE: usize = 12;

/// Umgebungsvariable mit dem Server-Geheimnis
pub const SCHLUESSEL_ENV: &str = "ENCRYPTION_SECRET_KEY";

/// Symmetrischer AEAD-Service (ChaCha20-Poly1305)
///
/// Nach der Konstruktion unveraenderlich und damit frei zwischen Tasks teilbar.
#[derive(Clone)]
pub struct CipherService {
    aead: ChaCha20Poly1305,
}

impl fmt::Debug for CipherService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Schluesselmaterial nie loggen
        f.debug_struct("CipherService").finish_non_exhaustive()
    }
}

impl CipherService {
    /// Erstellt den Service aus beliebig langem Schluesselmaterial
    pub fn neu(geheimnis: &[u8]) -> CryptoResult<Self> {
        if geheimnis.is_empty() {
            return Err(CryptoError::LeeresGeheimnis);
        }
        let digest = Sha256::digest(geheimnis);
        let aead = ChaCha20Poly1305::new(Key::from_slice(&digest));
        Ok(Self { aead })
    }

    /// Liest das Geheimnis aus `ENCRYPTION_SECRET_KEY`
    pub fn aus_env() -> CryptoResult<Self> {
        let geheimnis = std::env::var(SCHLUESSEL_ENV).map_err(|_| {
            tracing::error!(variable = SCHLUESSEL_ENV, "Verschluesselungs-Geheimnis fehlt");
            CryptoError::LeeresGeheimnis
        })?;
        Self::neu(geheimnis.as_bytes())
    }

    /// Verschluesselt `klartext` und gibt `nonce || sealed` zurueck
    pub fn verschluesseln(&self, klartext: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LAENGE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let sealed = self
            .aead
            .encrypt(Nonce::from_slice(&nonce_bytes), klartext)
            .map_err(|e| CryptoError::Verschluesselung(e.to_string()))?;

        let mut ausgabe = Vec::with_capacity(NONCE_LAENGE + sealed.len());
        ausgabe.extend_from_slice(&nonce_bytes);
        ausgabe.extend_from_slice(&sealed);
        Ok(ausgabe)
    }

    /// Entschluesselt `nonce || sealed`
    pub fn entschluesseln(&self, daten: &[u8]) -> CryptoResult<Vec<u8>> {
        if daten.len() < NONCE_LAENGE {
            return Err(CryptoError::UngueltigerCiphertext {
                laenge: daten.len(),
                minimum: NONCE_LAENGE,
            });
        }

        let (nonce, sealed) = daten.split_at(NONCE_LAENGE);
        self.aead
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::AuthentifizierungFehlgeschlagen)
    }

    /// Verschluesselt einen UTF-8-Text in die hex-kodierte At-Rest-Form
    pub fn verschluesseln_hex(&self, klartext: &str) -> CryptoResult<String> {
        Ok(hex::encode(self.verschluesseln(klartext.as_bytes())?))
    }

    /// Kehrt `verschluesseln_hex` um
    pub fn entschluesseln_hex(&self, kodiert: &str) -> CryptoResult<String> {
        let daten = hex::decode(kodiert)?;
        let klartext = self.entschluesseln(&daten)?;
        String::from_utf8(klartext).map_err(|e| CryptoError::UngueltigeDaten(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
