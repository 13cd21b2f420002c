//! hushline-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod rest;
pub mod state;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use axum::Router;
use hushline_crypto::{CipherService, SCHLUESSEL_ENV};
use hushline_db::SqliteDb;
use hushline_observability::{
    health_router, metrics_router, request_timing_layer, timing_middleware, MesswertQuelle,
};
use tower_http::cors::CorsLayer;

use config::ServerConfig;
use state::{messwerte, AppState};

/// Frist zum Wegschreiben der Persistenz-Queue beim Shutdown
const PERSISTENZ_NACHLAUF: Duration = Duration::from_secs(10);

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Verschluesselungs-Geheimnis pruefen
    /// 2. Datenbank oeffnen und migrieren
    /// 3. Signaling-Zustand und Services aufbauen
    /// 4. HTTP/WebSocket-Listener starten
    /// 5. Auf Ctrl-C warten
    /// 6. Persistenz-Queue leeren
    pub async fn starten(self) -> Result<()> {
        let geheimnis = self
            .config
            .sicherheit
            .verschluesselungs_geheimnis
            .clone()
            .with_context(|| format!("{SCHLUESSEL_ENV} ist nicht gesetzt"))?;
        let cipher = Arc::new(CipherService::neu(geheimnis.as_bytes())?);

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %self.config.bind_adresse(),
            "Server startet"
        );

        let db = Arc::new(SqliteDb::oeffnen(&self.config.datenbank_config()).await?);
        tracing::info!(url = %self.config.datenbank.url, "Datenbank bereit");

        let (state, persistenz_worker) = AppState::neu(
            db,
            cipher,
            self.config.signaling_config(),
            self.config.sicherheit.cors_origins.clone(),
        )?;

        db_pruefung_starten(
            state.clone(),
            Duration::from_secs(self.config.datenbank.pruef_intervall_sek.max(1)),
        );

        let app = app_router(state.clone(), self.config.observability.metriken_aktiviert);

        let listener = tokio::net::TcpListener::bind(self.config.bind_adresse()).await?;
        tracing::info!(adresse = %self.config.bind_adresse(), "HTTP/WebSocket-Listener bereit");

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(fehler = %e, "Shutdown-Signal nicht verfuegbar");
                }
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            })
            .await?;

        state.persistenz_beenden(persistenz_worker, PERSISTENZ_NACHLAUF).await;
        Ok(())
    }
}

/// Baut den vollstaendigen Router (WebSocket, REST, Health, Metriken)
pub fn app_router(state: AppState, metriken_aktiviert: bool) -> Router {
    let cors = cors_layer(&state.origins);

    let mut app = rest::routes::v1_router()
        .merge(ws::ws_router())
        .route_layer(axum::middleware::from_fn_with_state(
            state.metriken.clone(),
            timing_middleware,
        ))
        .with_state(state.clone())
        .merge(health_router(state.health.clone()));

    if metriken_aktiviert {
        let hub = Arc::clone(&state.signaling.hub);
        let quelle: Arc<dyn MesswertQuelle> = Arc::new(move || messwerte(&hub.statistik()));
        app = app.merge(metrics_router(state.metriken.clone(), quelle));
    }

    app.layer(request_timing_layer()).layer(cors)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
}

/// Prueft periodisch die Datenbank und meldet das Ergebnis an `/health`
fn db_pruefung_starten(state: AppState, intervall: Duration) {
    tokio::spawn(async move {
        let mut takt = tokio::time::interval(intervall);
        loop {
            takt.tick().await;
            let erreichbar = state.db.erreichbar().await;
            let vorher = state.health.status();
            let nachher = state.health.db_pruefung_melden(erreichbar);
            if vorher != nachher {
                tracing::warn!(erreichbar, status = ?nachher, "Health-Status geaendert");
            }
        }
    });
}
