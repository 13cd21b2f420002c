//! hushline-chat – Secret-Chats, Secret-Groups und Nachrichtenverlauf
//!
//! Dieses Crate implementiert:
//! - SecretChatService: Handshake fuer Ende-zu-Ende verschluesselte 1:1-Chats
//! - SecretGroupService: Mitgliedschaft, Moderation und Public-Key-Verzeichnis
//! - VerlaufService: Verlauf mit Entschluesselung, Bearbeiten, Soft-Delete
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use hushline_chat::{SecretChatService, VerlaufService};
//! use hushline_crypto::CipherService;
//! use hushline_db::SqliteDb;
//!
//! #[tokio::main]
//! async fn main() {
//!     let db = Arc::new(SqliteDb::in_memory().await.unwrap());
//!     let cipher = Arc::new(CipherService::neu(b"geheim").unwrap());
//!
//!     let secret_chats = SecretChatService::neu(db.clone());
//!     let verlauf = VerlaufService::neu(db.clone(), cipher);
//! }
//! ```

pub mod error;
pub mod secret_chat;
pub mod secret_group;
pub mod types;
pub mod verlauf;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use error::{ChatError, ChatResult};
pub use secret_chat::SecretChatService;
pub use secret_group::SecretGroupService;
pub use types::{
    HandshakeZustand, MitgliedAnfrage, PublicKeyAnfrage, SecretChatAnfrage, SecretChatAnsicht,
    SecretGroupAnfrage, SymmetrischeSchluesselAnfrage,
};
pub use verlauf::VerlaufService;
