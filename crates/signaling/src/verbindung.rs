//! Verbindungs-Handle – Die Sicht des Hubs auf eine Client-Verbindung
//!
//! Der Hub haelt keine Sockets, sondern nur ein `ClientVerbindung`-Handle:
//! eine begrenzte Send-Queue plus ein Schliess-Signal. Der Schreib-Task der
//! Transportschicht leert die Queue und beendet sich, sobald das Signal
//! gesetzt ist.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hushline_core::UserId;
use tokio::sync::{mpsc, watch};

use crate::error::{SignalingError, SignalingResult};

// ---------------------------------------------------------------------------
// Close-Codes
// ---------------------------------------------------------------------------

/// Normales Ende der Sitzung
pub const CLOSE_NORMAL: u16 = 1000;
/// Policy-Verletzung (Raum voll, nicht berechtigt)
pub const CLOSE_POLICY: u16 = 1008;
/// Benutzer hat sich an anderer Stelle verbunden
pub const CLOSE_ERSETZT: u16 = 4000;
/// Vom Server getrennt (Administration)
pub const CLOSE_GETRENNT: u16 = 4001;

// ---------------------------------------------------------------------------
// VerbindungsId
// ---------------------------------------------------------------------------

static NAECHSTE_ID: AtomicU64 = AtomicU64::new(1);

/// Prozessweit eindeutige ID einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VerbindungsId(pub u64);

impl VerbindungsId {
    pub fn neu() -> Self {
        Self(NAECHSTE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for VerbindungsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Ausgehend
// ---------------------------------------------------------------------------

/// Element der Send-Queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ausgehend {
    /// Text-Frame (JSON)
    Text(String),
    /// Close-Frame senden und den Schreib-Task beenden
    Schliessen { code: u16, grund: String },
}

// ---------------------------------------------------------------------------
// ClientVerbindung
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer Verbindung
///
/// Clone teilt Queue und Schliess-Signal.
#[derive(Clone)]
pub struct ClientVerbindung {
    id: VerbindungsId,
    user_id: UserId,
    tx: mpsc::Sender<Ausgehend>,
    geschlossen: Arc<watch::Sender<bool>>,
    schliessend: Arc<AtomicBool>,
}

impl fmt::Debug for ClientVerbindung {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientVerbindung")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("geschlossen", &self.ist_geschlossen())
            .finish()
    }
}

impl ClientVerbindung {
    /// Erstellt ein Handle mit begrenzter Queue und gibt die Empfangsseite zurueck
    pub fn neu(user_id: UserId, queue_groesse: usize) -> (Self, mpsc::Receiver<Ausgehend>) {
        let (tx, rx) = mpsc::channel(queue_groesse.max(1));
        let (geschlossen, _) = watch::channel(false);
        let verbindung = Self {
            id: VerbindungsId::neu(),
            user_id,
            tx,
            geschlossen: Arc::new(geschlossen),
            schliessend: Arc::new(AtomicBool::new(false)),
        };
        (verbindung, rx)
    }

    pub fn id(&self) -> VerbindungsId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn ist_geschlossen(&self) -> bool {
        *self.geschlossen.borrow()
    }

    /// Signal, das beim Schliessen auf `true` springt
    pub fn schliess_signal(&self) -> watch::Receiver<bool> {
        self.geschlossen.subscribe()
    }

    /// Reiht einen Text-Frame ein, wartet hoechstens `frist` auf Platz
    pub async fn senden(&self, frame: String, frist: Duration) -> SignalingResult<()> {
        if self.ist_geschlossen() {
            return Err(SignalingError::VerbindungGetrennt);
        }
        self.tx
            .send_timeout(Ausgehend::Text(frame), frist)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => {
                    tracing::debug!(
                        verbindung = %self.id,
                        user_id = %self.user_id,
                        frist_ms = frist.as_millis() as u64,
                        "Send-Queue voll, Frist abgelaufen"
                    );
                    SignalingError::Timeout
                }
                mpsc::error::SendTimeoutError::Closed(_) => SignalingError::VerbindungGetrennt,
            })
    }

    /// Schliesst die Verbindung (idempotent)
    ///
    /// Der Close-Frame wird nur eingereiht, wenn Platz ist; das Signal
    /// beendet den Schreib-Task in jedem Fall.
    pub fn schliessen(&self, code: u16, grund: impl Into<String>) {
        if self.schliessend.swap(true, Ordering::AcqRel) {
            return;
        }
        let grund = grund.into();
        tracing::debug!(
            verbindung = %self.id,
            user_id = %self.user_id,
            code,
            grund = %grund,
            "Verbindung wird geschlossen"
        );
        // Close-Frame muss vor dem Signal in der Queue liegen
        if let Err(e) = self.tx.try_send(Ausgehend::Schliessen { code, grund }) {
            let ursache = match e {
                mpsc::error::TrySendError::Full(_) => "Queue voll",
                mpsc::error::TrySendError::Closed(_) => "Queue geschlossen",
            };
            tracing::debug!(
                verbindung = %self.id,
                user_id = %self.user_id,
                code,
                ursache,
                "Close-Frame nicht eingereiht"
            );
        }
        self.geschlossen.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_sind_eindeutig() {
        let (a, _ra) = ClientVerbindung::neu(UserId::neu("a"), 4);
        let (b, _rb) = ClientVerbindung::neu(UserId::neu("a"), 4);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn senden_landet_in_queue() {
        let (v, mut rx) = ClientVerbindung::neu(UserId::neu("a"), 4);
        v.senden("{}".into(), Duration::from_millis(50))
            .await
            .expect("Senden fehlgeschlagen");
        assert_eq!(rx.recv().await, Some(Ausgehend::Text("{}".into())));
    }

    #[tokio::test]
    async fn volle_queue_laeuft_in_timeout() {
        let (v, _rx) = ClientVerbindung::neu(UserId::neu("a"), 1);
        v.senden("1".into(), Duration::from_millis(10)).await.unwrap();
        let err = v
            .senden("2".into(), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SignalingError::Timeout));
    }

    #[tokio::test]
    async fn geschlossener_empfaenger_meldet_trennung() {
        let (v, rx) = ClientVerbindung::neu(UserId::neu("a"), 4);
        drop(rx);
        let err = v
            .senden("x".into(), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SignalingError::VerbindungGetrennt));
    }

    #[tokio::test]
    async fn schliessen_ist_idempotent() {
        let (v, mut rx) = ClientVerbindung::neu(UserId::neu("a"), 4);
        let mut signal = v.schliess_signal();
        v.schliessen(CLOSE_NORMAL, "tschuess");
        v.schliessen(CLOSE_NORMAL, "nochmal");

        assert!(v.ist_geschlossen());
        assert!(*signal.borrow_and_update());
        assert_eq!(
            rx.recv().await,
            Some(Ausgehend::Schliessen {
                code: CLOSE_NORMAL,
                grund: "tschuess".into()
            })
        );
        assert!(rx.try_recv().is_err());

        let err = v.senden("x".into(), Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, SignalingError::VerbindungGetrennt));
    }

    #[tokio::test]
    async fn schliessen_bei_voller_queue_setzt_signal() {
        let (v, mut rx) = ClientVerbindung::neu(UserId::neu("a"), 1);
        v.senden("1".into(), Duration::from_millis(10)).await.unwrap();
        let signal = v.schliess_signal();

        v.schliessen(CLOSE_NORMAL, "voll");

        assert!(v.ist_geschlossen());
        assert!(*signal.borrow());
        // Nur der bereits eingereihte Frame, kein Close-Frame
        assert_eq!(rx.recv().await, Some(Ausgehend::Text("1".into())));
        assert!(rx.try_recv().is_err());
    }
}
