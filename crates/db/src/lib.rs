//! hushline-db – Speicher-Abstraktion
//!
//! Repository-Traits fuer Nachrichten, Secret-Chats und Secret-Groups sowie
//! deren SQLite-Implementierung (`SqliteDb`). IDs sind 24-stellige Hex-IDs
//! (`ObjektId`), Zeitstempel werden als RFC3339-Text abgelegt.

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use repository::{
    DatabaseConfig, DbResult, NachrichtenRepository, SecretChatRepository, SecretGroupRepository,
};
pub use sqlite::SqliteDb;
