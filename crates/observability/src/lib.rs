//! # hushline-observability
//!
//! Observability-Crate fuer Hushline:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured Logging via tracing-subscriber (Text oder JSON)
//! - Request-Timing Middleware

pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;

pub use health::{
    health_router, HealthResponse, HealthState, HealthStatus, HubAuslastung, HubQuelle,
};
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, HubMesswerte, HushlineMetrics, MesswertQuelle};
pub use middleware::{request_timing_layer, timing_middleware};
