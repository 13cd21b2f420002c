//! Prometheus-kompatible Metriken fuer Hushline
//!
//! Registrierte Metriken:
//! - `hushline_connected_users` – Gauge: Aktuell gebundene Benutzer
//! - `hushline_rooms_active{kind}` – Gauge: Aktive Raeume pro Raumart
//! - `hushline_room_connections{kind}` – Gauge: Verbindungen pro Raumart
//! - `hushline_rejected_joins_total` – Counter: Abgelehnte Beitritte (Raum voll)
//! - `hushline_evictions_total` – Counter: Verdraengte Bindungen
//! - `hushline_broadcast_write_failures_total` – Counter: Fehlgeschlagene Zustellungen
//! - `hushline_persistence_failures_total` – Counter: Fehlgeschlagene Speicherungen
//! - `hushline_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `hushline_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit
//!
//! Die Hub-Werte werden beim Scrape aus einer [`MesswertQuelle`] gelesen.

use std::sync::Arc;

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use parking_lot::Mutex;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use serde::Serialize;

/// Momentaufnahme der Live-Werte, die beim Scrape uebernommen werden
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubMesswerte {
    pub benutzer: u64,
    pub paar_raeume: u64,
    pub gruppen_raeume: u64,
    pub paar_verbindungen: u64,
    pub gruppen_verbindungen: u64,
    pub abgelehnte_beitritte: u64,
    pub verdraengungen: u64,
    pub schreibfehler: u64,
    pub persistenzfehler: u64,
}

/// Liefert die aktuellen Hub-Werte
pub trait MesswertQuelle: Send + Sync {
    fn messwerte(&self) -> HubMesswerte;
}

impl<F> MesswertQuelle for F
where
    F: Fn() -> HubMesswerte + Send + Sync,
{
    fn messwerte(&self) -> HubMesswerte {
        self()
    }
}

/// Alle Hushline-Prometheus-Metriken
#[derive(Clone)]
pub struct HushlineMetrics {
    pub registry: Arc<Registry>,

    // Hub
    pub connected_users: IntGauge,
    pub rooms_active: IntGaugeVec,
    pub room_connections: IntGaugeVec,
    pub rejected_joins_total: IntCounter,
    pub evictions_total: IntCounter,
    pub broadcast_write_failures_total: IntCounter,
    pub persistence_failures_total: IntCounter,

    // HTTP
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,

    /// Zuletzt uebernommene Zaehlerstaende
    stand: Arc<Mutex<HubMesswerte>>,
}

impl HushlineMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Hub ---
        let connected_users = IntGauge::with_opts(Opts::new(
            "hushline_connected_users",
            "Anzahl aktuell gebundener Benutzer",
        ))?;
        registry.register(Box::new(connected_users.clone()))?;

        let rooms_active = IntGaugeVec::new(
            Opts::new("hushline_rooms_active", "Anzahl aktiver Raeume"),
            &["kind"],
        )?;
        registry.register(Box::new(rooms_active.clone()))?;

        let room_connections = IntGaugeVec::new(
            Opts::new("hushline_room_connections", "Anzahl Verbindungen in Raeumen"),
            &["kind"],
        )?;
        registry.register(Box::new(room_connections.clone()))?;

        let rejected_joins_total = IntCounter::with_opts(Opts::new(
            "hushline_rejected_joins_total",
            "Wegen Kapazitaet abgelehnte Beitritte",
        ))?;
        registry.register(Box::new(rejected_joins_total.clone()))?;

        let evictions_total = IntCounter::with_opts(Opts::new(
            "hushline_evictions_total",
            "Durch neuen Beitritt verdraengte Bindungen",
        ))?;
        registry.register(Box::new(evictions_total.clone()))?;

        let broadcast_write_failures_total = IntCounter::with_opts(Opts::new(
            "hushline_broadcast_write_failures_total",
            "Fehlgeschlagene Zustellungen an einzelne Empfaenger",
        ))?;
        registry.register(Box::new(broadcast_write_failures_total.clone()))?;

        let persistence_failures_total = IntCounter::with_opts(Opts::new(
            "hushline_persistence_failures_total",
            "Fehlgeschlagene Speicherungen von Nachrichten",
        ))?;
        registry.register(Box::new(persistence_failures_total.clone()))?;

        // --- HTTP ---
        let http_requests_total = IntCounterVec::new(
            Opts::new("hushline_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "hushline_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_users,
            rooms_active,
            room_connections,
            rejected_joins_total,
            evictions_total,
            broadcast_write_failures_total,
            persistence_failures_total,
            http_requests_total,
            http_request_duration_seconds,
            stand: Arc::new(Mutex::new(HubMesswerte::default())),
        })
    }

    /// Uebernimmt eine Momentaufnahme des Hubs
    ///
    /// Gauges werden gesetzt, Counter um die Differenz zum letzten Stand erhoeht.
    pub fn hub_uebernehmen(&self, werte: &HubMesswerte) {
        self.connected_users.set(als_i64(werte.benutzer));
        self.rooms_active
            .with_label_values(&["pairwise"])
            .set(als_i64(werte.paar_raeume));
        self.rooms_active
            .with_label_values(&["group"])
            .set(als_i64(werte.gruppen_raeume));
        self.room_connections
            .with_label_values(&["pairwise"])
            .set(als_i64(werte.paar_verbindungen));
        self.room_connections
            .with_label_values(&["group"])
            .set(als_i64(werte.gruppen_verbindungen));

        let mut alt = self.stand.lock();
        self.rejected_joins_total
            .inc_by(werte.abgelehnte_beitritte.saturating_sub(alt.abgelehnte_beitritte));
        self.evictions_total
            .inc_by(werte.verdraengungen.saturating_sub(alt.verdraengungen));
        self.broadcast_write_failures_total
            .inc_by(werte.schreibfehler.saturating_sub(alt.schreibfehler));
        self.persistence_failures_total
            .inc_by(werte.persistenzfehler.saturating_sub(alt.persistenzfehler));
        *alt = *werte;
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

fn als_i64(wert: u64) -> i64 {
    i64::try_from(wert).unwrap_or(i64::MAX)
}

#[derive(Clone)]
struct MetrikZustand {
    metriken: HushlineMetrics,
    quelle: Arc<dyn MesswertQuelle>,
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: HushlineMetrics, quelle: Arc<dyn MesswertQuelle>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(MetrikZustand { metriken, quelle })
}

async fn metrics_handler(State(zustand): State<MetrikZustand>) -> impl IntoResponse {
    zustand.metriken.hub_uebernehmen(&zustand.quelle.messwerte());

    match zustand.metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
