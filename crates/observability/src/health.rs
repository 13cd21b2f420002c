//! Health-Check fuer Hushline (`GET /health`)
//!
//! Der Status ergibt sich aus der periodischen Datenbank-Pruefung:
//!
//! | Pruefung                            | Status      | HTTP |
//! |-------------------------------------|-------------|------|
//! | zuletzt erfolgreich                 | `healthy`   | 200  |
//! | 1 bis 2 Fehlschlaege in Folge       | `degraded`  | 200  |
//! | ab [`FEHLSCHLAEGE_BIS_UNHEALTHY`]   | `unhealthy` | 503  |
//!
//! Live-Zustellung laeuft auch ohne Datenbank weiter, deshalb bleibt ein
//! kurzer Ausfall `degraded`. Die Hub-Auslastung wird beim Abruf aus einer
//! [`HubQuelle`] gelesen.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

/// Fehlgeschlagene Pruefungen in Folge, ab denen der Server `unhealthy` meldet
pub const FEHLSCHLAEGE_BIS_UNHEALTHY: u32 = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    fn aus_fehlschlaegen(fehlschlaege: u32) -> Self {
        match fehlschlaege {
            0 => Self::Healthy,
            n if n < FEHLSCHLAEGE_BIS_UNHEALTHY => Self::Degraded,
            _ => Self::Unhealthy,
        }
    }

    pub fn http_status(self) -> StatusCode {
        match self {
            Self::Healthy | Self::Degraded => StatusCode::OK,
            Self::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Momentaufnahme der Hub-Auslastung
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HubAuslastung {
    pub connected_users: u64,
    pub rooms: u64,
}

/// Liefert die aktuelle Hub-Auslastung
pub trait HubQuelle: Send + Sync {
    fn auslastung(&self) -> HubAuslastung;
}

impl<F> HubQuelle for F
where
    F: Fn() -> HubAuslastung + Send + Sync,
{
    fn auslastung(&self) -> HubAuslastung {
        self()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub db_connected: bool,
    pub db_failed_checks: u32,
    pub hub: HubAuslastung,
}

/// Geteilter Zustand: Pruef-Ergebnis, Startzeit und Hub-Quelle
#[derive(Clone)]
pub struct HealthState {
    gestartet: Instant,
    fehlschlaege: Arc<AtomicU32>,
    hub: Option<Arc<dyn HubQuelle>>,
}

impl HealthState {
    pub fn neu() -> Self {
        Self {
            gestartet: Instant::now(),
            fehlschlaege: Arc::new(AtomicU32::new(0)),
            hub: None,
        }
    }

    pub fn mit_hub(mut self, quelle: Arc<dyn HubQuelle>) -> Self {
        self.hub = Some(quelle);
        self
    }

    /// Verbucht ein Pruef-Ergebnis und gibt den neuen Status zurueck
    pub fn db_pruefung_melden(&self, erreichbar: bool) -> HealthStatus {
        let fehlschlaege = if erreichbar {
            self.fehlschlaege.store(0, Ordering::Relaxed);
            0
        } else {
            self.fehlschlaege
                .fetch_add(1, Ordering::Relaxed)
                .saturating_add(1)
        };
        HealthStatus::aus_fehlschlaegen(fehlschlaege)
    }

    pub fn db_verbunden(&self) -> bool {
        self.fehlschlaege.load(Ordering::Relaxed) == 0
    }

    pub fn status(&self) -> HealthStatus {
        HealthStatus::aus_fehlschlaegen(self.fehlschlaege.load(Ordering::Relaxed))
    }

    pub fn bericht(&self) -> HealthResponse {
        let fehlschlaege = self.fehlschlaege.load(Ordering::Relaxed);
        HealthResponse {
            status: HealthStatus::aus_fehlschlaegen(fehlschlaege),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.gestartet.elapsed().as_secs(),
            db_connected: fehlschlaege == 0,
            db_failed_checks: fehlschlaege,
            hub: self.hub.as_ref().map(|q| q.auslastung()).unwrap_or_default(),
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::neu()
    }
}

pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let bericht = state.bericht();
    (bericht.status.http_status(), Json(bericht))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn abrufen(state: HealthState) -> (StatusCode, serde_json::Value) {
        let antwort = health_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = antwort.status();
        let bytes = axum::body::to_bytes(antwort.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn status_folgt_den_fehlschlaegen() {
        let state = HealthState::neu();
        assert_eq!(state.status(), HealthStatus::Healthy);

        assert_eq!(state.db_pruefung_melden(false), HealthStatus::Degraded);
        assert!(!state.db_verbunden());
        assert_eq!(state.db_pruefung_melden(false), HealthStatus::Degraded);
        assert_eq!(state.db_pruefung_melden(false), HealthStatus::Unhealthy);
        assert_eq!(state.db_pruefung_melden(false), HealthStatus::Unhealthy);

        // Ein Erfolg setzt zurueck
        assert_eq!(state.db_pruefung_melden(true), HealthStatus::Healthy);
        assert!(state.db_verbunden());
    }

    #[tokio::test]
    async fn endpunkt_meldet_hub_auslastung() {
        let quelle: Arc<dyn HubQuelle> = Arc::new(|| HubAuslastung {
            connected_users: 7,
            rooms: 3,
        });
        let (status, json) = abrufen(HealthState::neu().mit_hub(quelle)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["db_connected"], true);
        assert_eq!(json["hub"]["connected_users"], 7);
        assert_eq!(json["hub"]["rooms"], 3);
    }

    #[tokio::test]
    async fn kurzer_db_ausfall_bleibt_erreichbar() {
        let state = HealthState::neu();
        state.db_pruefung_melden(false);
        let (status, json) = abrufen(state).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["db_failed_checks"], 1);
        assert_eq!(json["hub"]["connected_users"], 0);
    }

    #[tokio::test]
    async fn anhaltender_db_ausfall_liefert_503() {
        let state = HealthState::neu();
        for _ in 0..FEHLSCHLAEGE_BIS_UNHEALTHY {
            state.db_pruefung_melden(false);
        }
        let (status, json) = abrufen(state).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["db_connected"], false);
    }
}
