//! Gemeinsamer Zustand fuer alle Sitzungen
//!
//! Haelt Hub, Broadcast-Engine, Cipher und Persistenz-Pipeline als
//! Arc-Referenzen, die sicher zwischen tokio-Tasks geteilt werden koennen.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hushline_crypto::CipherService;
use hushline_db::NachrichtenRepository;
use tokio::task::JoinHandle;

use crate::broadcast::BroadcastEngine;
use crate::hub::{Hub, HubConfig, GRUPPEN_KAPAZITAET, PAAR_KAPAZITAET};
use crate::persistenz::{Persistierer, STANDARD_QUEUE_GROESSE};

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale Teilnehmer eines 1:1-Raums
    pub paar_kapazitaet: usize,
    /// Maximale Teilnehmer eines Gruppenraums
    pub gruppen_kapazitaet: usize,
    /// Frist pro Empfaenger beim Broadcast
    pub schreib_timeout_ms: u64,
    /// Groesse der Send-Queue pro Verbindung
    pub sende_queue_groesse: usize,
    /// Groesse der Persistenz-Queue
    pub persistenz_queue_groesse: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            paar_kapazitaet: PAAR_KAPAZITAET,
            gruppen_kapazitaet: GRUPPEN_KAPAZITAET,
            schreib_timeout_ms: 5_000,
            sende_queue_groesse: 64,
            persistenz_queue_groesse: STANDARD_QUEUE_GROESSE,
        }
    }
}

impl SignalingConfig {
    pub fn schreib_frist(&self) -> Duration {
        Duration::from_millis(self.schreib_timeout_ms.max(1))
    }
}

/// Gemeinsamer Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    pub config: Arc<SignalingConfig>,
    pub hub: Arc<Hub>,
    pub broadcast: BroadcastEngine,
    pub cipher: Arc<CipherService>,
    pub persistierer: Persistierer,
    /// Startzeitpunkt (fuer Uptime-Berechnung)
    pub gestartet_um: Instant,
}

impl SignalingState {
    /// Erstellt den Zustand und startet den Persistenz-Worker
    ///
    /// Muss innerhalb einer tokio-Runtime aufgerufen werden.
    pub fn neu(
        config: SignalingConfig,
        cipher: Arc<CipherService>,
        repo: Arc<dyn NachrichtenRepository>,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let hub = Arc::new(Hub::neu(HubConfig {
            paar_kapazitaet: config.paar_kapazitaet,
            gruppen_kapazitaet: config.gruppen_kapazitaet,
        }));
        let broadcast = BroadcastEngine::neu(Arc::clone(&hub), config.schreib_frist());
        let (persistierer, worker) = Persistierer::starten(
            repo,
            config.persistenz_queue_groesse,
            Arc::clone(hub.zaehler()),
        );

        tracing::info!(
            paar_kapazitaet = config.paar_kapazitaet,
            gruppen_kapazitaet = config.gruppen_kapazitaet,
            schreib_timeout_ms = config.schreib_timeout_ms,
            "Signaling-Zustand initialisiert"
        );

        let state = Arc::new(Self {
            config: Arc::new(config),
            hub,
            broadcast,
            cipher,
            persistierer,
            gestartet_um: Instant::now(),
        });
        (state, worker)
    }

    /// Uptime in Sekunden
    pub fn uptime_sek(&self) -> u64 {
        self.gestartet_um.elapsed().as_secs()
    }
}
