//! Broadcast-Engine – Verteilt Frames an alle Raum-Teilnehmer ausser dem Absender
//!
//! Die Engine arbeitet auf einem Snapshot des Hubs und schreibt parallel an
//! alle Empfaenger. Jeder Schreibvorgang ist durch eine Frist begrenzt, ein
//! langsamer oder toter Empfaenger haelt die uebrigen also nicht auf.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use hushline_core::{RaumId, UserId};

use crate::error::{SignalingError, SignalingResult};
use crate::hub::{Hub, HubZaehler};

/// Standard-Frist pro Empfaenger
pub const STANDARD_SCHREIB_FRIST: Duration = Duration::from_secs(5);

/// Fan-out von Frames innerhalb eines Raums
#[derive(Clone)]
pub struct BroadcastEngine {
    hub: Arc<Hub>,
    schreib_frist: Duration,
}

impl BroadcastEngine {
    pub fn neu(hub: Arc<Hub>, schreib_frist: Duration) -> Self {
        Self { hub, schreib_frist }
    }

    pub fn schreib_frist(&self) -> Duration {
        self.schreib_frist
    }

    /// Sendet `frame` an alle Teilnehmer von `raum_id` ausser `sender_id`
    ///
    /// Gibt die Anzahl erfolgreicher Zustellungen zurueck. Schlagen einzelne
    /// Empfaenger fehl, erhalten alle anderen den Frame trotzdem und der
    /// Fehler listet die betroffenen Benutzer auf.
    pub async fn an_raum_senden(
        &self,
        raum_id: &RaumId,
        sender_id: &UserId,
        frame: &str,
    ) -> SignalingResult<usize> {
        let snapshot = self.hub.mitglieder_snapshot(raum_id);
        if snapshot.is_empty() {
            return Err(SignalingError::RaumNichtGefunden(raum_id.clone()));
        }

        let frist = self.schreib_frist;
        let zustellungen = snapshot
            .into_iter()
            .filter(|(user_id, _)| user_id != sender_id)
            .map(|(user_id, verbindung)| async move {
                let ergebnis = verbindung.senden(frame.to_owned(), frist).await;
                (user_id, ergebnis)
            });

        let mut zugestellt = 0;
        let mut fehlgeschlagen = Vec::new();
        for (user_id, ergebnis) in join_all(zustellungen).await {
            match ergebnis {
                Ok(()) => zugestellt += 1,
                Err(e) => {
                    HubZaehler::erhoehen(&self.hub.zaehler().schreibfehler);
                    tracing::warn!(raum_id = %raum_id, empfaenger = %user_id, fehler = %e, "Zustellung fehlgeschlagen");
                    fehlgeschlagen.push((user_id, e.to_string()));
                }
            }
        }

        tracing::trace!(raum_id = %raum_id, sender = %sender_id, zugestellt, "Broadcast abgeschlossen");

        if fehlgeschlagen.is_empty() {
            Ok(zugestellt)
        } else {
            fehlgeschlagen.sort_by(|a, b| a.0.cmp(&b.0));
            Err(SignalingError::TeilweiseFehlgeschlagen {
                zugestellt,
                fehlgeschlagen,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verbindung::{Ausgehend, ClientVerbindung};
    use tokio::sync::mpsc;

    fn uid(s: &str) -> UserId {
        UserId::neu(s)
    }

    fn beitreten(hub: &Hub, raum: &str, user: &str, queue: usize) -> mpsc::Receiver<Ausgehend> {
        let (v, rx) = ClientVerbindung::neu(uid(user), queue);
        hub.gruppe_beitreten(&RaumId::neu(raum), &uid(user), v)
            .expect("Beitritt fehlgeschlagen");
        rx
    }

    fn engine(hub: &Arc<Hub>) -> BroadcastEngine {
        BroadcastEngine::neu(Arc::clone(hub), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn absender_wird_ausgelassen() {
        let hub = Arc::new(Hub::default());
        let mut rx_a = beitreten(&hub, "g", "a", 8);
        let mut rx_b = beitreten(&hub, "g", "b", 8);
        let mut rx_c = beitreten(&hub, "g", "c", 8);

        let n = engine(&hub)
            .an_raum_senden(&RaumId::neu("g"), &uid("a"), "hallo")
            .await
            .unwrap();

        assert_eq!(n, 2);
        assert_eq!(rx_b.try_recv().unwrap(), Ausgehend::Text("hallo".into()));
        assert_eq!(rx_c.try_recv().unwrap(), Ausgehend::Text("hallo".into()));
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn leerer_raum_ist_nicht_gefunden() {
        let hub = Arc::new(Hub::default());
        let err = engine(&hub)
            .an_raum_senden(&RaumId::neu("leer"), &uid("a"), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, SignalingError::RaumNichtGefunden(_)));
    }

    #[tokio::test]
    async fn einzelner_fehler_isoliert() {
        let hub = Arc::new(Hub::default());
        let _rx_a = beitreten(&hub, "g", "a", 8);
        let mut rx_b = beitreten(&hub, "g", "b", 8);
        let rx_tot = beitreten(&hub, "g", "tot", 8);
        let mut rx_d = beitreten(&hub, "g", "d", 8);
        drop(rx_tot);

        let err = engine(&hub)
            .an_raum_senden(&RaumId::neu("g"), &uid("a"), "x")
            .await
            .unwrap_err();

        match err {
            SignalingError::TeilweiseFehlgeschlagen {
                zugestellt,
                fehlgeschlagen,
            } => {
                assert_eq!(zugestellt, 2);
                assert_eq!(fehlgeschlagen.len(), 1);
                assert_eq!(fehlgeschlagen[0].0, uid("tot"));
            }
            andere => panic!("Unerwarteter Fehler: {andere}"),
        }
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_d.try_recv().is_ok());
        assert_eq!(hub.statistik().schreibfehler, 1);
    }

    #[tokio::test]
    async fn langsamer_empfaenger_scheitert_in_begrenzter_zeit() {
        let hub = Arc::new(Hub::default());
        let _rx_a = beitreten(&hub, "g", "a", 8);
        let mut rx_b = beitreten(&hub, "g", "b", 8);
        // Queue der Groesse 1, wird nie geleert
        let _rx_langsam = beitreten(&hub, "g", "langsam", 1);

        let engine = engine(&hub);
        let raum = RaumId::neu("g");
        engine.an_raum_senden(&raum, &uid("a"), "1").await.unwrap();

        let start = std::time::Instant::now();
        let err = engine.an_raum_senden(&raum, &uid("a"), "2").await.unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(2));

        match err {
            SignalingError::TeilweiseFehlgeschlagen { zugestellt, fehlgeschlagen } => {
                assert_eq!(zugestellt, 1);
                assert_eq!(fehlgeschlagen[0].0, uid("langsam"));
            }
            andere => panic!("Unerwarteter Fehler: {andere}"),
        }
        assert_eq!(rx_b.try_recv().unwrap(), Ausgehend::Text("1".into()));
        assert_eq!(rx_b.try_recv().unwrap(), Ausgehend::Text("2".into()));
    }
}
