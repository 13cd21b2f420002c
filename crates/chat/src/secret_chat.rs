//! SecretChatService – Handshake fuer Ende-zu-Ende verschluesselte 1:1-Chats
//!
//! Der Server sieht nur Public Keys und gewrappte Schluessel, niemals den
//! symmetrischen Chat-Schluessel selbst. Ablauf:
//!
//! 1. `erstellen`: Chat fuer ein ungeordnetes Benutzerpaar (nur einmal)
//! 2. `public_key_hochladen`: jede Seite genau einmal
//! 3. `symmetrische_schluessel_hochladen`: erst wenn beide Public Keys da sind
//! 4. `annehmen`: nur Teilnehmer 2

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hushline_core::ObjektId;
use hushline_db::{
    models::{NachrichtRecord, SecretChatRecord, Seite},
    NachrichtenRepository, SecretChatRepository,
};

use crate::error::{ChatError, ChatResult};
use crate::types::HandshakeZustand;
use crate::verlauf::ausblenden;

/// Secret-Chat-Handshake und Verlauf
pub struct SecretChatService<R: SecretChatRepository + NachrichtenRepository> {
    repo: Arc<R>,
}

impl<R: SecretChatRepository + NachrichtenRepository> SecretChatService<R> {
    pub fn neu(repo: Arc<R>) -> Arc<Self> {
        Arc::new(Self { repo })
    }

    /// Legt einen Secret-Chat zwischen `user` und `ziel` an
    pub async fn erstellen(
        &self,
        user: ObjektId,
        ziel: ObjektId,
        expire_at: Option<DateTime<Utc>>,
    ) -> ChatResult<SecretChatRecord> {
        if user == ziel {
            return Err(ChatError::UngueltigeEingabe(
                "Secret-Chat mit sich selbst ist nicht moeglich".into(),
            ));
        }
        if expire_at.is_some_and(|t| t <= Utc::now()) {
            return Err(ChatError::UngueltigeEingabe(
                "Ablaufzeitpunkt liegt in der Vergangenheit".into(),
            ));
        }

        let chat = SecretChatRepository::create(self.repo.as_ref(), user, ziel, expire_at)
            .await
            .map_err(|e| {
                if e.ist_eindeutigkeit() {
                    ChatError::DoppelterChat
                } else {
                    e.into()
                }
            })?;

        tracing::info!(chat_id = %chat.id, user_1 = %user, user_2 = %ziel, "Secret-Chat erstellt");
        Ok(chat)
    }

    /// Laedt einen Chat, nur fuer Teilnehmer
    pub async fn laden(&self, chat_id: ObjektId, aufrufer: ObjektId) -> ChatResult<SecretChatRecord> {
        let chat = self.chat_laden(chat_id).await?;
        if !chat.ist_teilnehmer(&aufrufer) {
            return Err(ChatError::nicht_autorisiert("Kein Teilnehmer dieses Chats"));
        }
        Ok(chat)
    }

    /// Alle laufenden Secret-Chats des Aufrufers, auch noch nicht angenommene
    pub async fn fuer_benutzer(&self, aufrufer: ObjektId) -> ChatResult<Vec<SecretChatRecord>> {
        Ok(self.repo.fuer_teilnehmer(aufrufer).await?)
    }

    /// Setzt den Public Key des Aufrufers (genau einmal)
    pub async fn public_key_hochladen(
        &self,
        chat_id: ObjektId,
        aufrufer: ObjektId,
        public_key: &str,
    ) -> ChatResult<SecretChatRecord> {
        if public_key.trim().is_empty() {
            return Err(ChatError::UngueltigeEingabe("Public Key darf nicht leer sein".into()));
        }

        let chat = self.laden(chat_id, aufrufer).await?;
        let eigener = if chat.user_1 == aufrufer {
            &chat.user_1_public_key
        } else {
            &chat.user_2_public_key
        };
        if !eigener.is_empty() {
            return Err(ChatError::SchluesselBereitsGesetzt);
        }

        // Bedingtes Update: ein paralleler Upload derselben Seite verliert hier
        if !self
            .repo
            .public_key_setzen(chat_id, aufrufer, public_key)
            .await?
        {
            return Err(ChatError::SchluesselBereitsGesetzt);
        }

        let chat = self.chat_laden(chat_id).await?;
        tracing::info!(
            chat_id = %chat_id,
            user_id = %aufrufer,
            zustand = ?HandshakeZustand::von(&chat),
            "Public Key gesetzt"
        );
        Ok(chat)
    }

    /// Setzt die gewrappten Schluessel beider Teilnehmer und finalisiert
    pub async fn symmetrische_schluessel_hochladen(
        &self,
        chat_id: ObjektId,
        aufrufer: ObjektId,
        user_1_key: &str,
        user_2_key: &str,
    ) -> ChatResult<SecretChatRecord> {
        if user_1_key.trim().is_empty() || user_2_key.trim().is_empty() {
            return Err(ChatError::UngueltigeEingabe(
                "Beide gewrappten Schluessel sind erforderlich".into(),
            ));
        }

        let chat = self.laden(chat_id, aufrufer).await?;
        if !chat.public_keys_vollstaendig() {
            return Err(ChatError::PublicKeysUnvollstaendig);
        }
        if chat.key_finalized {
            return Err(ChatError::SchluesselBereitsGesetzt);
        }

        if !self
            .repo
            .symmetrische_keys_setzen(chat_id, user_1_key, user_2_key)
            .await?
        {
            // Zwischen Pruefung und Update hat ein anderer Upload gewonnen
            return Err(ChatError::SchluesselBereitsGesetzt);
        }

        tracing::info!(chat_id = %chat_id, user_id = %aufrufer, "Secret-Chat-Schluessel finalisiert");
        self.chat_laden(chat_id).await
    }

    /// Teilnehmer 2 nimmt den Chat an
    pub async fn annehmen(&self, chat_id: ObjektId, aufrufer: ObjektId) -> ChatResult<SecretChatRecord> {
        let chat = self.chat_laden(chat_id).await?;
        if chat.user_2 != aufrufer {
            return Err(ChatError::nicht_autorisiert(
                "Nur der eingeladene Teilnehmer kann annehmen",
            ));
        }
        if !chat.user_2_accepted {
            self.repo.akzeptieren(chat_id).await?;
            tracing::info!(chat_id = %chat_id, "Secret-Chat angenommen");
        }
        self.chat_laden(chat_id).await
    }

    /// Verlauf; Inhalte bleiben Client-Ciphertext, eigene Loeschungen werden ausgeblendet
    pub async fn nachrichten(
        &self,
        chat_id: ObjektId,
        aufrufer: ObjektId,
        seite: Seite,
    ) -> ChatResult<Vec<NachrichtRecord>> {
        self.laden(chat_id, aufrufer).await?;

        let mut nachrichten = self.repo.chat_verlauf(chat_id, seite).await?;
        for n in nachrichten.iter_mut().filter(|n| n.ist_geloescht_fuer(&aufrufer)) {
            ausblenden(n);
        }
        Ok(nachrichten)
    }

    /// Loescht den Chat samt Nachrichten
    pub async fn loeschen(&self, chat_id: ObjektId, aufrufer: ObjektId) -> ChatResult<()> {
        self.laden(chat_id, aufrufer).await?;
        SecretChatRepository::delete(self.repo.as_ref(), chat_id).await?;
        tracing::info!(chat_id = %chat_id, user_id = %aufrufer, "Secret-Chat geloescht");
        Ok(())
    }

    /// Ob `user` am Chat teilnimmt (fuer die Zulassung zu Live-Verbindungen)
    pub async fn ist_teilnehmer(&self, chat_id: ObjektId, user: ObjektId) -> ChatResult<bool> {
        Ok(SecretChatRepository::get(self.repo.as_ref(), chat_id)
            .await?
            .is_some_and(|c| c.ist_teilnehmer(&user)))
    }

    async fn chat_laden(&self, chat_id: ObjektId) -> ChatResult<SecretChatRecord> {
        SecretChatRepository::get(self.repo.as_ref(), chat_id)
            .await?
            .ok_or_else(|| ChatError::nicht_gefunden(format!("Secret-Chat {chat_id}")))
    }
}
