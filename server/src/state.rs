//! Gemeinsamer Axum-State fuer WebSocket- und REST-Handler

use std::sync::Arc;
use std::time::Duration;

use hushline_chat::{SecretChatService, SecretGroupService, VerlaufService};
use hushline_core::{RaumId, UserId};
use hushline_crypto::CipherService;
use hushline_db::SqliteDb;
use hushline_observability::{
    HealthState, HubAuslastung, HubMesswerte, HubQuelle, HushlineMetrics,
};
use hushline_signaling::{HubStatistik, SignalingConfig, SignalingState};
use tokio::task::JoinHandle;

/// Alles, was die Handler brauchen (Clone teilt die Arcs)
#[derive(Clone)]
pub struct AppState {
    pub signaling: Arc<SignalingState>,
    pub db: Arc<SqliteDb>,
    pub secret_chats: Arc<SecretChatService<SqliteDb>>,
    pub secret_groups: Arc<SecretGroupService<SqliteDb>>,
    pub verlauf: Arc<VerlaufService<SqliteDb>>,
    /// Erlaubte Origins fuer WebSocket-Upgrades
    pub origins: Arc<Vec<String>>,
    pub health: HealthState,
    pub metriken: HushlineMetrics,
}

impl AppState {
    /// Baut den State und startet den Persistenz-Worker
    pub fn neu(
        db: Arc<SqliteDb>,
        cipher: Arc<CipherService>,
        signaling_config: SignalingConfig,
        origins: Vec<String>,
    ) -> anyhow::Result<(Self, JoinHandle<()>)> {
        let (signaling, worker) =
            SignalingState::neu(signaling_config, Arc::clone(&cipher), db.clone());

        let hub = Arc::clone(&signaling.hub);
        let hub_quelle: Arc<dyn HubQuelle> = Arc::new(move || auslastung(&hub.statistik()));

        let state = Self {
            signaling,
            secret_chats: SecretChatService::neu(db.clone()),
            secret_groups: SecretGroupService::neu(db.clone()),
            verlauf: VerlaufService::neu(db.clone(), cipher),
            db,
            origins: Arc::new(origins),
            health: HealthState::neu().mit_hub(hub_quelle),
            metriken: HushlineMetrics::neu()?,
        };
        Ok((state, worker))
    }

    /// Schliesst die Persistenz-Queue und wartet, bis der Worker alles
    /// Eingereihte geschrieben hat. `false`, wenn die Frist ablaeuft.
    pub async fn persistenz_beenden(&self, worker: JoinHandle<()>, frist: Duration) -> bool {
        self.signaling.persistierer.schliessen();
        match tokio::time::timeout(frist, worker).await {
            Ok(Ok(())) => {
                tracing::info!("Persistenz-Worker beendet");
                true
            }
            Ok(Err(e)) => {
                tracing::error!(fehler = %e, "Persistenz-Worker abgebrochen");
                false
            }
            Err(_) => {
                tracing::warn!(
                    frist_ms = frist.as_millis() as u64,
                    "Persistenz-Worker endet nicht rechtzeitig"
                );
                false
            }
        }
    }

    /// Trennt `user` nur dann, wenn er gerade in `raum` gebunden ist
    pub fn aus_raum_trennen(&self, raum: &RaumId, user: &UserId) -> bool {
        let hub = &self.signaling.hub;
        match hub.raum_von(user) {
            Some((aktuell, _)) if &aktuell == raum => hub.user_trennen(user),
            _ => false,
        }
    }
}

/// Auslastung fuer `/health`
pub fn auslastung(statistik: &HubStatistik) -> HubAuslastung {
    let n = |v: usize| u64::try_from(v).unwrap_or(u64::MAX);
    HubAuslastung {
        connected_users: n(statistik.benutzer_gesamt),
        rooms: n(statistik.paar_raeume + statistik.gruppen_raeume),
    }
}

/// Uebersetzt die Hub-Statistik in die Werte fuer Prometheus
pub fn messwerte(statistik: &HubStatistik) -> HubMesswerte {
    let n = |v: usize| u64::try_from(v).unwrap_or(u64::MAX);
    HubMesswerte {
        benutzer: n(statistik.benutzer_gesamt),
        paar_raeume: n(statistik.paar_raeume),
        gruppen_raeume: n(statistik.gruppen_raeume),
        paar_verbindungen: n(statistik.paar_verbindungen),
        gruppen_verbindungen: n(statistik.gruppen_verbindungen),
        abgelehnte_beitritte: statistik.abgelehnte_beitritte,
        verdraengungen: statistik.verdraengungen,
        schreibfehler: statistik.schreibfehler,
        persistenzfehler: statistik.persistenzfehler,
    }
}
