//! hushline-signaling – Echtzeit-Schicht
//!
//! Verwaltet Raum-Belegung, Fan-out und die Sitzungs-Schleife pro
//! Verbindung. Die Transportschicht (WebSocket im Server) liefert nur einen
//! Strom eingehender Text-Frames und leert die Send-Queue des Handles.
//!
//! ## Architektur
//!
//! ```text
//! Transport (WebSocket)
//!     |  ClientVerbindung (Send-Queue + Schliess-Signal)
//!     v
//! Sitzung (pro Verbindung ein Task)
//!     |-- Envelope stempeln
//!     |-- Persistierer  -> NachrichtenRepository (eigener Worker)
//!     +-- BroadcastEngine -> Hub-Snapshot -> andere Teilnehmer
//!
//! Hub – einziger Besitzer von Raum- und Benutzer-Bindungen
//! ```

pub mod broadcast;
pub mod envelope;
pub mod error;
pub mod hub;
pub mod persistenz;
pub mod server_state;
pub mod session;
pub mod verbindung;

// Bequeme Re-Exporte
pub use broadcast::BroadcastEngine;
pub use envelope::Envelope;
pub use error::{SignalingError, SignalingResult};
pub use hub::{Hub, HubConfig, HubStatistik, RaumArt, RaumAuslastung};
pub use persistenz::Persistierer;
pub use server_state::{SignalingConfig, SignalingState};
pub use session::{fehler_frame, Sitzung, SitzungsArt, SitzungsKontext};
pub use verbindung::{Ausgehend, ClientVerbindung, VerbindungsId};
