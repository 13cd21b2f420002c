//! hushline-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Hushline-Crates gemeinsam genutzt werden: die Identifikations-
//! typen fuer Benutzer, Raeume und persistierte Dokumente sowie deren
//! Parse-Fehler.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::HushlineError;
pub use types::{ObjektId, RaumId, UserId};
