//! Hub – Registry fuer Raum-Belegung und Benutzer-Bindungen
//!
//! Der Hub ist der einzige Besitzer des geteilten Live-Zustands:
//!
//! ```text
//! paar_raeume:    RaumId -> { UserId -> ClientVerbindung }   (Kapazitaet 2)
//! gruppen_raeume: RaumId -> { UserId -> ClientVerbindung }   (Kapazitaet 100)
//! bindungen:      UserId -> (RaumId, RaumArt, ClientVerbindung)
//! ```
//!
//! Ein Benutzer belegt hoechstens einen Raum gleichzeitig. Alle Aenderungen
//! laufen unter einem einzigen Schreib-Lock, damit Eviction, Kapazitaets-
//! pruefung und Registrierung atomar ueber alle Maps hinweg passieren.
//! Nach aussen werden nur Kopien herausgegeben.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use hushline_core::{RaumId, UserId};
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{SignalingError, SignalingResult};
use crate::verbindung::{ClientVerbindung, VerbindungsId, CLOSE_ERSETZT, CLOSE_GETRENNT};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Kapazitaet eines 1:1-Raums
pub const PAAR_KAPAZITAET: usize = 2;
/// Standard-Kapazitaet eines Gruppenraums
pub const GRUPPEN_KAPAZITAET: usize = 100;

/// Art eines Raums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RaumArt {
    /// 1:1-Chat (regulaer oder secret)
    Paar,
    /// Gruppe (regulaer oder secret)
    Gruppe,
}

/// Kapazitaeten pro Raumart
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    pub paar_kapazitaet: usize,
    pub gruppen_kapazitaet: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            paar_kapazitaet: PAAR_KAPAZITAET,
            gruppen_kapazitaet: GRUPPEN_KAPAZITAET,
        }
    }
}

// ---------------------------------------------------------------------------
// Statistik
// ---------------------------------------------------------------------------

/// Laufende Zaehler, geteilt mit Broadcast und Persistenz
#[derive(Debug, Default)]
pub struct HubZaehler {
    pub abgelehnte_beitritte: AtomicU64,
    pub verdraengungen: AtomicU64,
    pub schreibfehler: AtomicU64,
    pub persistenzfehler: AtomicU64,
}

impl HubZaehler {
    pub(crate) fn erhoehen(zaehler: &AtomicU64) {
        zaehler.fetch_add(1, Ordering::Relaxed);
    }
}

/// Momentaufnahme des Hub-Zustands
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubStatistik {
    pub benutzer_gesamt: usize,
    pub paar_raeume: usize,
    pub gruppen_raeume: usize,
    pub paar_verbindungen: usize,
    pub gruppen_verbindungen: usize,
    pub abgelehnte_beitritte: u64,
    pub verdraengungen: u64,
    pub schreibfehler: u64,
    pub persistenzfehler: u64,
}

/// Raum an oder ueber seiner Kapazitaetsgrenze
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaumAuslastung {
    pub raum_id: RaumId,
    pub art: RaumArt,
    pub belegt: usize,
    pub kapazitaet: usize,
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

type Raum = HashMap<UserId, ClientVerbindung>;

#[derive(Debug, Clone)]
struct Bindung {
    raum_id: RaumId,
    art: RaumArt,
    verbindung: ClientVerbindung,
}

#[derive(Default)]
struct HubZustand {
    paar_raeume: HashMap<RaumId, Raum>,
    gruppen_raeume: HashMap<RaumId, Raum>,
    bindungen: HashMap<UserId, Bindung>,
}

impl HubZustand {
    fn raeume(&mut self, art: RaumArt) -> &mut HashMap<RaumId, Raum> {
        match art {
            RaumArt::Paar => &mut self.paar_raeume,
            RaumArt::Gruppe => &mut self.gruppen_raeume,
        }
    }

    /// Entfernt `user_id` aus dem Raum, sofern dort genau diese Verbindung steht
    fn aus_raum_entfernen(
        &mut self,
        art: RaumArt,
        raum_id: &RaumId,
        user_id: &UserId,
        verbindungs_id: VerbindungsId,
    ) -> bool {
        let raeume = self.raeume(art);
        let Some(raum) = raeume.get_mut(raum_id) else {
            return false;
        };
        let entfernt = match raum.get(user_id) {
            Some(v) if v.id() == verbindungs_id => raum.remove(user_id).is_some(),
            _ => false,
        };
        if raum.is_empty() {
            raeume.remove(raum_id);
        }
        entfernt
    }

    /// Loest die globale Bindung und die Raumbelegung eines Benutzers
    fn bindung_loesen(&mut self, user_id: &UserId) -> Option<Bindung> {
        let alt = self.bindungen.remove(user_id)?;
        self.aus_raum_entfernen(alt.art, &alt.raum_id, user_id, alt.verbindung.id());
        Some(alt)
    }
}

/// Thread-sichere Registry aller Live-Raeume
pub struct Hub {
    config: HubConfig,
    zustand: RwLock<HubZustand>,
    zaehler: std::sync::Arc<HubZaehler>,
}

impl Hub {
    pub fn neu(config: HubConfig) -> Self {
        Self {
            config,
            zustand: RwLock::new(HubZustand::default()),
            zaehler: std::sync::Arc::new(HubZaehler::default()),
        }
    }

    pub fn config(&self) -> HubConfig {
        self.config
    }

    pub fn zaehler(&self) -> &std::sync::Arc<HubZaehler> {
        &self.zaehler
    }

    pub fn kapazitaet(&self, art: RaumArt) -> usize {
        match art {
            RaumArt::Paar => self.config.paar_kapazitaet,
            RaumArt::Gruppe => self.config.gruppen_kapazitaet,
        }
    }

    /// Tritt einem 1:1-Raum bei (Kapazitaet 2)
    pub fn paar_beitreten(
        &self,
        raum_id: &RaumId,
        user_id: &UserId,
        verbindung: ClientVerbindung,
    ) -> SignalingResult<()> {
        self.beitreten(RaumArt::Paar, raum_id, user_id, verbindung)
    }

    /// Tritt einem Gruppenraum bei (Kapazitaet laut Konfiguration)
    pub fn gruppe_beitreten(
        &self,
        raum_id: &RaumId,
        user_id: &UserId,
        verbindung: ClientVerbindung,
    ) -> SignalingResult<()> {
        self.beitreten(RaumArt::Gruppe, raum_id, user_id, verbindung)
    }

    /// Registriert `verbindung` als einzige Bindung von `user_id`
    ///
    /// Eine bestehende Bindung wird zuerst verdraengt (geschlossen und aus
    /// ihrem Raum entfernt). Danach wird die Kapazitaet geprueft; bei
    /// Ablehnung ist der Benutzer nirgends mehr verbunden.
    pub fn beitreten(
        &self,
        art: RaumArt,
        raum_id: &RaumId,
        user_id: &UserId,
        verbindung: ClientVerbindung,
    ) -> SignalingResult<()> {
        let kapazitaet = self.kapazitaet(art);

        let (verdraengt, ergebnis) = {
            let mut zustand = self.zustand.write();
            let verdraengt = zustand.bindung_loesen(user_id);

            let raum = zustand.raeume(art).entry(raum_id.clone()).or_default();
            let ergebnis = if raum.len() >= kapazitaet && !raum.contains_key(user_id) {
                if raum.is_empty() {
                    zustand.raeume(art).remove(raum_id);
                }
                Err(SignalingError::KapazitaetUeberschritten {
                    raum_id: raum_id.clone(),
                    kapazitaet,
                })
            } else {
                raum.insert(user_id.clone(), verbindung.clone());
                zustand.bindungen.insert(
                    user_id.clone(),
                    Bindung {
                        raum_id: raum_id.clone(),
                        art,
                        verbindung,
                    },
                );
                Ok(())
            };
            (verdraengt, ergebnis)
        };

        // Schliessen ausserhalb des Locks
        if let Some(alt) = verdraengt {
            HubZaehler::erhoehen(&self.zaehler.verdraengungen);
            tracing::info!(
                user_id = %user_id,
                alter_raum = %alt.raum_id,
                neuer_raum = %raum_id,
                verbindung = %alt.verbindung.id(),
                "Bestehende Bindung verdraengt"
            );
            alt.verbindung.schliessen(CLOSE_ERSETZT, "an anderer Stelle verbunden");
        }

        match &ergebnis {
            Ok(()) => tracing::debug!(user_id = %user_id, raum_id = %raum_id, ?art, "Raum betreten"),
            Err(_) => {
                HubZaehler::erhoehen(&self.zaehler.abgelehnte_beitritte);
                tracing::warn!(user_id = %user_id, raum_id = %raum_id, kapazitaet, "Beitritt abgelehnt, Raum voll");
            }
        }
        ergebnis
    }

    /// Verlaesst einen Raum
    ///
    /// Entfernt nur Eintraege, die noch auf `verbindungs_id` zeigen. Eine
    /// inzwischen neuere Verbindung desselben Benutzers bleibt unberuehrt.
    pub fn verlassen(
        &self,
        raum_id: &RaumId,
        user_id: &UserId,
        verbindungs_id: VerbindungsId,
    ) -> bool {
        let mut zustand = self.zustand.write();

        let entfernt = zustand.aus_raum_entfernen(RaumArt::Paar, raum_id, user_id, verbindungs_id)
            | zustand.aus_raum_entfernen(RaumArt::Gruppe, raum_id, user_id, verbindungs_id);

        if zustand
            .bindungen
            .get(user_id)
            .is_some_and(|b| b.verbindung.id() == verbindungs_id)
        {
            zustand.bindungen.remove(user_id);
        }

        if entfernt {
            tracing::debug!(user_id = %user_id, raum_id = %raum_id, "Raum verlassen");
        }
        entfernt
    }

    /// Kopie der aktuellen Belegung eines Raums (leer, wenn unbekannt)
    pub fn mitglieder_snapshot(&self, raum_id: &RaumId) -> HashMap<UserId, ClientVerbindung> {
        let zustand = self.zustand.read();
        zustand
            .paar_raeume
            .get(raum_id)
            .or_else(|| zustand.gruppen_raeume.get(raum_id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn mitglieder_anzahl(&self, raum_id: &RaumId) -> usize {
        let zustand = self.zustand.read();
        zustand
            .paar_raeume
            .get(raum_id)
            .or_else(|| zustand.gruppen_raeume.get(raum_id))
            .map_or(0, HashMap::len)
    }

    pub fn raum_art(&self, raum_id: &RaumId) -> Option<RaumArt> {
        let zustand = self.zustand.read();
        if zustand.paar_raeume.contains_key(raum_id) {
            Some(RaumArt::Paar)
        } else if zustand.gruppen_raeume.contains_key(raum_id) {
            Some(RaumArt::Gruppe)
        } else {
            None
        }
    }

    pub fn ist_verbunden(&self, user_id: &UserId) -> bool {
        self.zustand.read().bindungen.contains_key(user_id)
    }

    /// Raum, in dem der Benutzer gerade gebunden ist
    pub fn raum_von(&self, user_id: &UserId) -> Option<(RaumId, RaumArt)> {
        self.zustand
            .read()
            .bindungen
            .get(user_id)
            .map(|b| (b.raum_id.clone(), b.art))
    }

    pub fn statistik(&self) -> HubStatistik {
        let zustand = self.zustand.read();
        HubStatistik {
            benutzer_gesamt: zustand.bindungen.len(),
            paar_raeume: zustand.paar_raeume.len(),
            gruppen_raeume: zustand.gruppen_raeume.len(),
            paar_verbindungen: zustand.paar_raeume.values().map(HashMap::len).sum(),
            gruppen_verbindungen: zustand.gruppen_raeume.values().map(HashMap::len).sum(),
            abgelehnte_beitritte: self.zaehler.abgelehnte_beitritte.load(Ordering::Relaxed),
            verdraengungen: self.zaehler.verdraengungen.load(Ordering::Relaxed),
            schreibfehler: self.zaehler.schreibfehler.load(Ordering::Relaxed),
            persistenzfehler: self.zaehler.persistenzfehler.load(Ordering::Relaxed),
        }
    }

    /// Alle Raeume an oder ueber ihrer Kapazitaet
    pub fn kapazitaet_pruefen(&self) -> Vec<RaumAuslastung> {
        let zustand = self.zustand.read();
        let mut volle = Vec::new();
        for (art, raeume) in [
            (RaumArt::Paar, &zustand.paar_raeume),
            (RaumArt::Gruppe, &zustand.gruppen_raeume),
        ] {
            let kapazitaet = self.kapazitaet(art);
            volle.extend(
                raeume
                    .iter()
                    .filter(|(_, raum)| raum.len() >= kapazitaet)
                    .map(|(raum_id, raum)| RaumAuslastung {
                        raum_id: raum_id.clone(),
                        art,
                        belegt: raum.len(),
                        kapazitaet,
                    }),
            );
        }
        volle.sort_by(|a, b| a.raum_id.cmp(&b.raum_id));
        volle
    }

    /// Trennt einen Benutzer von aussen (Administration, Ban)
    pub fn user_trennen(&self, user_id: &UserId) -> bool {
        let alt = self.zustand.write().bindung_loesen(user_id);
        match alt {
            Some(bindung) => {
                tracing::info!(user_id = %user_id, raum_id = %bindung.raum_id, "Benutzer getrennt");
                bindung.verbindung.schliessen(CLOSE_GETRENNT, "vom Server getrennt");
                true
            }
            None => false,
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::neu(HubConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
