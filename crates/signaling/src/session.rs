//! Sitzungs-Schleife – Ein Task pro zugelassener Verbindung
//!
//! ## Ablauf pro Frame
//! ```text
//! Frame lesen -> Envelope parsen -> sender_id/receiver_id stempeln
//!     -> NeueNachricht bauen (regulaer: verschluesseln, secret: unveraendert)
//!     -> Persistenz-Queue
//!     -> Broadcast an alle anderen Teilnehmer
//! ```
//!
//! Die Schleife endet, wenn der Eingang endet oder fehlschlaegt oder die
//! Verbindung von aussen geschlossen wird (Verdraengung, Administration).
//! Das Aufraeumen (Hub verlassen, Verbindung schliessen) uebernimmt ein
//! Drop-Guard und laeuft damit auf jedem Ausstiegspfad.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use hushline_core::{RaumId, UserId};
use hushline_db::models::NeueNachricht;
use serde::Serialize;

use crate::envelope::Envelope;
use crate::error::{SignalingError, SignalingResult};
use crate::hub::{Hub, RaumArt};
use crate::server_state::SignalingState;
use crate::verbindung::{ClientVerbindung, CLOSE_NORMAL};

// ---------------------------------------------------------------------------
// Sitzungs-Kontext
// ---------------------------------------------------------------------------

/// Art der Sitzung, bestimmt Raumart und Verschluesselung at rest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SitzungsArt {
    Chat,
    SecretChat,
    Gruppe,
    SecretGruppe,
}

impl SitzungsArt {
    pub fn raum_art(&self) -> RaumArt {
        match self {
            Self::Chat | Self::SecretChat => RaumArt::Paar,
            Self::Gruppe | Self::SecretGruppe => RaumArt::Gruppe,
        }
    }

    /// Secret-Inhalte sind Client-Ciphertext und werden nicht angefasst
    pub fn ist_secret(&self) -> bool {
        matches!(self, Self::SecretChat | Self::SecretGruppe)
    }
}

/// Identitaet einer Sitzung, festgelegt beim Verbindungsaufbau
#[derive(Debug, Clone)]
pub struct SitzungsKontext {
    pub art: SitzungsArt,
    pub raum_id: RaumId,
    pub user_id: UserId,
    /// Nur bei 1:1-Chats
    pub empfaenger_id: Option<UserId>,
}

/// Fehler-Frame an den Client, z.B. `{"error":"capacity_exceeded",...}`
pub fn fehler_frame(fehler: &SignalingError) -> String {
    serde_json::json!({
        "error": fehler.code(),
        "message": fehler.to_string(),
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// Aufraeum-Guard
// ---------------------------------------------------------------------------

struct AufraeumGuard {
    hub: Arc<Hub>,
    raum_id: RaumId,
    user_id: UserId,
    verbindung: ClientVerbindung,
}

impl Drop for AufraeumGuard {
    fn drop(&mut self) {
        self.hub
            .verlassen(&self.raum_id, &self.user_id, self.verbindung.id());
        self.verbindung.schliessen(CLOSE_NORMAL, "Sitzung beendet");
        tracing::debug!(
            user_id = %self.user_id,
            raum_id = %self.raum_id,
            verbindung = %self.verbindung.id(),
            "Sitzung aufgeraeumt"
        );
    }
}

// ---------------------------------------------------------------------------
// Sitzung
// ---------------------------------------------------------------------------

/// Eine zugelassene Verbindung in einem Raum
pub struct Sitzung {
    state: Arc<SignalingState>,
    kontext: SitzungsKontext,
    verbindung: ClientVerbindung,
}

impl Sitzung {
    /// Laesst die Verbindung im Hub zu
    ///
    /// Bei `KapazitaetUeberschritten` ist nichts registriert; der Aufrufer
    /// meldet den Fehler dem Client und schliesst die Verbindung.
    pub fn beitreten(
        state: Arc<SignalingState>,
        kontext: SitzungsKontext,
        verbindung: ClientVerbindung,
    ) -> SignalingResult<Self> {
        state.hub.beitreten(
            kontext.art.raum_art(),
            &kontext.raum_id,
            &kontext.user_id,
            verbindung.clone(),
        )?;
        tracing::info!(
            user_id = %kontext.user_id,
            raum_id = %kontext.raum_id,
            art = ?kontext.art,
            verbindung = %verbindung.id(),
            "Sitzung gestartet"
        );
        Ok(Self {
            state,
            kontext,
            verbindung,
        })
    }

    pub fn kontext(&self) -> &SitzungsKontext {
        &self.kontext
    }

    /// Verarbeitet eingehende Frames bis Eingang oder Verbindung enden
    pub async fn ausfuehren<S>(self, mut eingang: S)
    where
        S: Stream<Item = SignalingResult<String>> + Unpin,
    {
        let _guard = AufraeumGuard {
            hub: Arc::clone(&self.state.hub),
            raum_id: self.kontext.raum_id.clone(),
            user_id: self.kontext.user_id.clone(),
            verbindung: self.verbindung.clone(),
        };

        let mut schliess_signal = self.verbindung.schliess_signal();
        if self.verbindung.ist_geschlossen() {
            return;
        }

        loop {
            tokio::select! {
                frame = eingang.next() => {
                    match frame {
                        Some(Ok(text)) => {
                            if let Err(e) = self.frame_verarbeiten(&text).await {
                                tracing::warn!(
                                    user_id = %self.kontext.user_id,
                                    raum_id = %self.kontext.raum_id,
                                    fehler = %e,
                                    "Frame verworfen"
                                );
                            }
                        }
                        Some(Err(e)) => {
                            tracing::debug!(user_id = %self.kontext.user_id, fehler = %e, "Lesefehler");
                            break;
                        }
                        None => {
                            tracing::info!(user_id = %self.kontext.user_id, raum_id = %self.kontext.raum_id, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                signal = schliess_signal.changed() => {
                    if signal.is_err() || *schliess_signal.borrow() {
                        tracing::info!(user_id = %self.kontext.user_id, raum_id = %self.kontext.raum_id, "Verbindung von aussen geschlossen");
                        break;
                    }
                }
            }
        }
    }

    /// Stempelt, persistiert und verteilt einen einzelnen Frame
    async fn frame_verarbeiten(&self, text: &str) -> SignalingResult<()> {
        let k = &self.kontext;
        let mut envelope = Envelope::parsen(text)?;
        envelope.stempeln(&k.user_id, k.empfaenger_id.as_ref());

        if let Some(nachricht) = self.nachricht_bauen(&envelope) {
            self.state.persistierer.einreihen(nachricht);
        }

        let frame = envelope.serialisieren()?;
        match self
            .state
            .broadcast
            .an_raum_senden(&k.raum_id, &k.user_id, &frame)
            .await
        {
            Ok(zugestellt) => {
                tracing::trace!(raum_id = %k.raum_id, zugestellt, "Frame verteilt");
            }
            Err(e) => {
                tracing::warn!(raum_id = %k.raum_id, sender = %k.user_id, fehler = %e, "Broadcast unvollstaendig");
            }
        }
        Ok(())
    }

    /// Baut den Datensatz fuer die Persistenz, `None` wenn nicht speicherbar
    fn nachricht_bauen(&self, envelope: &Envelope) -> Option<NeueNachricht> {
        let k = &self.kontext;

        let (sender_id, raum) = match (k.user_id.als_objekt_id(), k.raum_id.als_objekt_id()) {
            (Ok(s), Ok(r)) => (s, r),
            _ => {
                tracing::debug!(
                    user_id = %k.user_id,
                    raum_id = %k.raum_id,
                    "Keine persistierbaren IDs, Nachricht wird nur zugestellt"
                );
                return None;
            }
        };
        let receiver_id = k
            .empfaenger_id
            .as_ref()
            .and_then(|e| e.als_objekt_id().ok());

        let content = if k.art.ist_secret() {
            envelope.content.clone()
        } else {
            match self.state.cipher.verschluesseln_hex(&envelope.content) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(raum_id = %k.raum_id, fehler = %e, "Verschluesselung fehlgeschlagen, Nachricht nicht gespeichert");
                    return None;
                }
            }
        };

        let (chat_id, group_id) = match k.art.raum_art() {
            RaumArt::Paar => (Some(raum), None),
            RaumArt::Gruppe => (None, Some(raum)),
        };

        Some(NeueNachricht {
            chat_id,
            group_id,
            sender_id,
            receiver_id,
            content_type: envelope.inhalts_typ(),
            content,
            content_address: envelope.content_address.clone(),
            is_secret: k.art.ist_secret(),
            created_at: None,
        })
    }
}
