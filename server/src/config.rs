//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Umgebungsvariablen ueberschreiben einzelne Werte:
//!
//! - `CORS_ALLOWED_ORIGINS`: kommagetrennte Liste erlaubter Origins
//! - `ENCRYPTION_SECRET_KEY`: Geheimnis fuer die Verschluesselung at rest

use hushline_crypto::SCHLUESSEL_ENV;
use hushline_db::DatabaseConfig;
use hushline_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};

/// Umgebungsvariable fuer erlaubte Origins
pub const CORS_ENV: &str = "CORS_ALLOWED_ORIGINS";
/// Standard-Origin, wenn nichts konfiguriert ist
pub const STANDARD_ORIGIN: &str = "http://localhost:5000";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Datenbank-Einstellungen
    pub datenbank: DatenbankEinstellungen,
    /// Raum-Kapazitaeten und Zustellung
    pub hub: HubEinstellungen,
    /// CORS und Verschluesselung
    pub sicherheit: SicherheitsEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Hushline Server".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer HTTP und WebSocket
    pub bind_adresse: String,
    /// Port fuer HTTP und WebSocket
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 5000,
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Verbindungs-URL
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    /// WAL-Modus fuer SQLite
    pub sqlite_wal: bool,
    /// Intervall der Erreichbarkeits-Pruefung in Sekunden
    pub pruef_intervall_sek: u64,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        Self {
            url: "sqlite://hushline.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
            pruef_intervall_sek: 15,
        }
    }
}

/// Raum-Kapazitaeten und Zustell-Parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubEinstellungen {
    pub paar_kapazitaet: usize,
    pub gruppen_kapazitaet: usize,
    /// Frist pro Empfaenger und Frame
    pub schreib_timeout_ms: u64,
    /// Send-Queue pro Verbindung
    pub sende_queue_groesse: usize,
    /// Queue der Persistenz-Pipeline
    pub persistenz_queue_groesse: usize,
}

impl Default for HubEinstellungen {
    fn default() -> Self {
        let s = SignalingConfig::default();
        Self {
            paar_kapazitaet: s.paar_kapazitaet,
            gruppen_kapazitaet: s.gruppen_kapazitaet,
            schreib_timeout_ms: s.schreib_timeout_ms,
            sende_queue_groesse: s.sende_queue_groesse,
            persistenz_queue_groesse: s.persistenz_queue_groesse,
        }
    }
}

/// CORS und Verschluesselung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SicherheitsEinstellungen {
    /// Erlaubte Origins fuer WebSocket und REST. WebSocket-Upgrades ohne
    /// Origin-Header werden immer abgelehnt, auch bei `*`.
    pub cors_origins: Vec<String>,
    /// Geheimnis fuer die Verschluesselung at rest (besser per Umgebung setzen)
    #[serde(skip_serializing)]
    pub verschluesselungs_geheimnis: Option<String>,
}

impl Default for SicherheitsEinstellungen {
    fn default() -> Self {
        Self {
            cors_origins: vec![STANDARD_ORIGIN.into()],
            verschluesselungs_geheimnis: None,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// `/metrics` ausliefern
    pub metriken_aktiviert: bool,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            metriken_aktiviert: true,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei und wendet
    /// Umgebungsvariablen an.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let mut config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str::<Self>(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.umgebung_anwenden(
            std::env::var(CORS_ENV).ok().as_deref(),
            std::env::var(SCHLUESSEL_ENV).ok().as_deref(),
        );
        Ok(config)
    }

    /// Ueberschreibt Origins und Geheimnis mit gesetzten Umgebungswerten
    pub fn umgebung_anwenden(&mut self, origins: Option<&str>, geheimnis: Option<&str>) {
        if let Some(origins) = origins {
            let liste = origins_parsen(origins);
            if !liste.is_empty() {
                self.sicherheit.cors_origins = liste;
            }
        }
        if let Some(geheimnis) = geheimnis.filter(|g| !g.is_empty()) {
            self.sicherheit.verschluesselungs_geheimnis = Some(geheimnis.to_string());
        }
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    pub fn datenbank_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.datenbank.url.clone(),
            max_verbindungen: self.datenbank.max_verbindungen,
            sqlite_wal: self.datenbank.sqlite_wal,
        }
    }

    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            paar_kapazitaet: self.hub.paar_kapazitaet,
            gruppen_kapazitaet: self.hub.gruppen_kapazitaet,
            schreib_timeout_ms: self.hub.schreib_timeout_ms,
            sende_queue_groesse: self.hub.sende_queue_groesse,
            persistenz_queue_groesse: self.hub.persistenz_queue_groesse,
        }
    }
}

/// Zerlegt eine kommagetrennte Origin-Liste
pub fn origins_parsen(roh: &str) -> Vec<String> {
    roh.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|o| o.trim_end_matches('/').to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.netzwerk.port, 5000);
        assert_eq!(cfg.hub.paar_kapazitaet, 2);
        assert_eq!(cfg.hub.gruppen_kapazitaet, 100);
        assert_eq!(cfg.hub.schreib_timeout_ms, 5_000);
        assert_eq!(cfg.sicherheit.cors_origins, vec![STANDARD_ORIGIN.to_string()]);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.sicherheit.verschluesselungs_geheimnis.is_none());
    }

    #[test]
    fn bind_adresse() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_adresse(), "0.0.0.0:5000");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            name = "Mein Server"

            [hub]
            gruppen_kapazitaet = 10
            schreib_timeout_ms = 250
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.name, "Mein Server");
        assert_eq!(cfg.hub.gruppen_kapazitaet, 10);
        assert_eq!(cfg.signaling_config().schreib_timeout_ms, 250);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.hub.paar_kapazitaet, 2);
        assert_eq!(cfg.netzwerk.port, 5000);
    }

    #[test]
    fn umgebung_ueberschreibt_origins_und_geheimnis() {
        let mut cfg = ServerConfig::default();
        cfg.umgebung_anwenden(Some("https://a.example, https://b.example/ ,"), Some("s3cret"));
        assert_eq!(
            cfg.sicherheit.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert_eq!(cfg.sicherheit.verschluesselungs_geheimnis.as_deref(), Some("s3cret"));
    }

    #[test]
    fn leere_umgebung_aendert_nichts() {
        let mut cfg = ServerConfig::default();
        cfg.umgebung_anwenden(Some(" , "), Some(""));
        assert_eq!(cfg.sicherheit.cors_origins, vec![STANDARD_ORIGIN.to_string()]);
        assert!(cfg.sicherheit.verschluesselungs_geheimnis.is_none());
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/hushline.toml").unwrap();
        assert_eq!(cfg.server.name, "Hushline Server");
    }
}
