//! # hushline-crypto
//!
//! Symmetrische Verschluesselung von Nachrichteninhalten at rest.
//!
//! Regulaere Chats und Gruppen sind nicht Ende-zu-Ende verschluesselt: der
//! Server legt den Inhalt verschluesselt (ChaCha20-Poly1305) in der Datenbank
//! ab und entschluesselt ihn beim Laden der History. Secret-Chats und
//! Secret-Groups laufen an diesem Crate vorbei, der Server sieht dort nur
//! Client-Ciphertext.
//!
//! ## Module
//! - `cipher` - `CipherService` (encrypt/decrypt, Hex-Kodierung)
//! - `error` - Fehlertypen

pub mod cipher;
pub mod error;

// Bequeme Re-Exports
pub use cipher::{CipherService, NONCE_LAENGE, SCHLUESSEL_ENV};
pub use error::{CryptoError, CryptoResult};
