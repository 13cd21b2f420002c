//! VerlaufService – Nachrichtenverlauf regulaerer Chats und Gruppen
//!
//! Regulaere Inhalte liegen hex-kodiert und verschluesselt in der Datenbank
//! und werden hier entschluesselt. Secret-Inhalte bleiben unangetastet.
//! Nachrichten, die der Aufrufer fuer sich geloescht hat, werden ausgeblendet.

use std::sync::Arc;

use hushline_core::ObjektId;
use hushline_crypto::CipherService;
use hushline_db::{
    models::{NachrichtRecord, Seite},
    NachrichtenRepository,
};

use crate::error::{ChatError, ChatResult};

/// Leert Inhalt und Adresse einer Nachricht
pub(crate) fn ausblenden(nachricht: &mut NachrichtRecord) {
    nachricht.content.clear();
    nachricht.content_address.clear();
}

/// Verlauf, Bearbeiten und Soft-Delete von Nachrichten
pub struct VerlaufService<R: NachrichtenRepository> {
    repo: Arc<R>,
    cipher: Arc<CipherService>,
}

impl<R: NachrichtenRepository> VerlaufService<R> {
    pub fn neu(repo: Arc<R>, cipher: Arc<CipherService>) -> Arc<Self> {
        Arc::new(Self { repo, cipher })
    }

    /// Verlauf eines 1:1-Chats, aelteste zuerst
    pub async fn chat_nachrichten(
        &self,
        chat_id: ObjektId,
        aufrufer: ObjektId,
        seite: Seite,
    ) -> ChatResult<Vec<NachrichtRecord>> {
        let nachrichten = self.repo.chat_verlauf(chat_id, seite).await?;
        Ok(self.aufbereiten(nachrichten, &aufrufer))
    }

    /// Verlauf einer Gruppe, aelteste zuerst
    pub async fn gruppen_nachrichten(
        &self,
        group_id: ObjektId,
        aufrufer: ObjektId,
        seite: Seite,
    ) -> ChatResult<Vec<NachrichtRecord>> {
        let nachrichten = self.repo.gruppen_verlauf(group_id, seite).await?;
        Ok(self.aufbereiten(nachrichten, &aufrufer))
    }

    /// Ersetzt den Inhalt einer eigenen Nachricht
    pub async fn nachricht_bearbeiten(
        &self,
        nachricht_id: ObjektId,
        aufrufer: ObjektId,
        neuer_inhalt: &str,
    ) -> ChatResult<NachrichtRecord> {
        let alt = self.nachricht_laden(nachricht_id).await?;
        if alt.sender_id != aufrufer {
            return Err(ChatError::nicht_autorisiert("Nur eigene Nachrichten sind editierbar"));
        }

        let gespeichert = if alt.is_secret {
            neuer_inhalt.to_string()
        } else {
            self.cipher.verschluesseln_hex(neuer_inhalt)?
        };
        let mut record = self.repo.update_content(nachricht_id, &gespeichert).await?;
        if !record.is_secret {
            record.content = neuer_inhalt.to_string();
        }
        Ok(record)
    }

    /// Blendet eine Nachricht fuer den Absender aus
    pub async fn fuer_sender_loeschen(&self, nachricht_id: ObjektId, aufrufer: ObjektId) -> ChatResult<()> {
        let n = self.nachricht_laden(nachricht_id).await?;
        if n.sender_id != aufrufer {
            return Err(ChatError::nicht_autorisiert("Aufrufer ist nicht der Absender"));
        }
        self.repo.fuer_sender_markieren(nachricht_id, aufrufer).await?;
        tracing::debug!(nachricht_id = %nachricht_id, "Fuer Absender geloescht");
        Ok(())
    }

    /// Blendet eine Nachricht fuer den Empfaenger aus
    pub async fn fuer_empfaenger_loeschen(
        &self,
        nachricht_id: ObjektId,
        aufrufer: ObjektId,
    ) -> ChatResult<()> {
        let n = self.nachricht_laden(nachricht_id).await?;
        if n.receiver_id != Some(aufrufer) {
            return Err(ChatError::nicht_autorisiert("Aufrufer ist nicht der Empfaenger"));
        }
        self.repo.fuer_empfaenger_markieren(nachricht_id, aufrufer).await?;
        tracing::debug!(nachricht_id = %nachricht_id, "Fuer Empfaenger geloescht");
        Ok(())
    }

    /// Entfernt eine Nachricht endgueltig (nur Absender)
    pub async fn fuer_alle_loeschen(&self, nachricht_id: ObjektId, aufrufer: ObjektId) -> ChatResult<()> {
        let n = self.nachricht_laden(nachricht_id).await?;
        if n.sender_id != aufrufer {
            return Err(ChatError::nicht_autorisiert("Aufrufer ist nicht der Absender"));
        }
        self.repo.delete(nachricht_id).await?;
        tracing::info!(nachricht_id = %nachricht_id, "Nachricht fuer alle geloescht");
        Ok(())
    }

    async fn nachricht_laden(&self, nachricht_id: ObjektId) -> ChatResult<NachrichtRecord> {
        self.repo
            .get(nachricht_id)
            .await?
            .ok_or_else(|| ChatError::nicht_gefunden(format!("Nachricht {nachricht_id}")))
    }

    fn aufbereiten(&self, mut nachrichten: Vec<NachrichtRecord>, aufrufer: &ObjektId) -> Vec<NachrichtRecord> {
        for n in &mut nachrichten {
            if n.ist_geloescht_fuer(aufrufer) {
                ausblenden(n);
                continue;
            }
            if n.is_secret || n.content.is_empty() {
                continue;
            }
            match self.cipher.entschluesseln_hex(&n.content) {
                Ok(klartext) => n.content = klartext,
                Err(e) => {
                    // Defekte Einzelnachricht: ausblenden statt Fehler fuer die ganze Seite
                    tracing::warn!(nachricht_id = %n.id, fehler = %e, "Entschluesselung fehlgeschlagen");
                    ausblenden(n);
                }
            }
        }
        nachrichten
    }
}
