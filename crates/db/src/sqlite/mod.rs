//! SQLite-Backend-Implementierungen fuer alle Repository-Traits

pub mod nachrichten;
pub mod pool;
pub mod secret_chats;
pub mod secret_groups;
mod zeit;

pub use pool::SqliteDb;
