//! SecretGroupService – Mitgliedschaft und Schluesselverteilung fuer Secret-Groups
//!
//! Der Server verwaltet pro Mitglied Public Key und Beitrittszeit. Clients
//! wrappen den Gruppenschluessel selbst fuer jedes Mitglied und schicken die
//! Ergebnisse als `users_symmetric_keys` mit jeder Nachricht; nach Bann oder
//! Entfernen rotieren die Clients den Schluessel.

use std::sync::Arc;

use hushline_core::ObjektId;
use hushline_db::{
    models::{
        BeitrittsErgebnis, NachrichtRecord, NeueSecretGroup, SecretGroupMitglied,
        SecretGroupRecord, Seite,
    },
    NachrichtenRepository, SecretGroupRepository,
};
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};
use crate::types::SecretGroupAnfrage;
use crate::verlauf::ausblenden;

/// Maximale Laenge eines Gruppennamens
const MAX_NAME_LAENGE: usize = 128;

pub struct SecretGroupService<R: SecretGroupRepository + NachrichtenRepository> {
    repo: Arc<R>,
}

impl<R: SecretGroupRepository + NachrichtenRepository> SecretGroupService<R> {
    pub fn neu(repo: Arc<R>) -> Arc<Self> {
        Arc::new(Self { repo })
    }

    /// Legt eine Gruppe an; der Owner ist sofort Mitglied und Admin
    pub async fn erstellen(
        &self,
        owner: ObjektId,
        anfrage: SecretGroupAnfrage,
    ) -> ChatResult<SecretGroupRecord> {
        let name = anfrage.name.trim();
        if name.is_empty() || name.len() > MAX_NAME_LAENGE {
            return Err(ChatError::UngueltigeEingabe(format!(
                "Gruppenname muss 1 bis {MAX_NAME_LAENGE} Zeichen haben"
            )));
        }
        if anfrage.public_key.trim().is_empty() {
            return Err(ChatError::UngueltigeEingabe(
                "Public Key des Owners fehlt".into(),
            ));
        }

        let gruppe = SecretGroupRepository::create(
            self.repo.as_ref(),
            NeueSecretGroup {
                owner_id: owner,
                owner_public_key: anfrage.public_key,
                name: name.to_string(),
                description: anfrage.description,
                group_type: anfrage.group_type,
                invite_link: Uuid::new_v4().to_string(),
            },
        )
        .await?;

        tracing::info!(group_id = %gruppe.id, owner = %owner, "Secret-Group erstellt");
        Ok(gruppe)
    }

    /// Laedt eine Gruppe, nur fuer Mitglieder
    pub async fn laden(&self, group_id: ObjektId, aufrufer: ObjektId) -> ChatResult<SecretGroupRecord> {
        let gruppe = self.gruppe_laden(group_id).await?;
        if !gruppe.ist_mitglied(&aufrufer) {
            return Err(ChatError::nicht_autorisiert("Kein Mitglied dieser Gruppe"));
        }
        Ok(gruppe)
    }

    /// Gruppen, in denen der Aufrufer aktives Mitglied ist
    pub async fn fuer_benutzer(&self, aufrufer: ObjektId) -> ChatResult<Vec<SecretGroupRecord>> {
        Ok(self.repo.fuer_mitglied(aufrufer).await?)
    }

    /// Tritt ueber den Einladungslink bei
    ///
    /// Mitgliedschaft, Beitrittszeit und Public Key werden in einer
    /// Speicheroperation gesetzt.
    pub async fn beitreten(
        &self,
        invite_link: &str,
        user: ObjektId,
        public_key: &str,
    ) -> ChatResult<SecretGroupMitglied> {
        if public_key.trim().is_empty() {
            return Err(ChatError::UngueltigeEingabe("Public Key fehlt".into()));
        }
        let gruppe = self
            .repo
            .get_nach_einladung(invite_link)
            .await?
            .ok_or_else(|| ChatError::nicht_gefunden("Einladungslink"))?;

        match self.repo.beitreten(gruppe.id, user, public_key).await? {
            BeitrittsErgebnis::Beigetreten(mitglied) => {
                tracing::info!(group_id = %gruppe.id, user_id = %user, "Secret-Group beigetreten");
                Ok(mitglied)
            }
            BeitrittsErgebnis::BereitsMitglied => Err(ChatError::BereitsMitglied),
            BeitrittsErgebnis::Gebannt => Err(ChatError::Gebannt),
        }
    }

    /// Verlaesst die Gruppe (nicht fuer den Owner)
    pub async fn verlassen(&self, group_id: ObjektId, user: ObjektId) -> ChatResult<()> {
        let gruppe = self.gruppe_laden(group_id).await?;
        if gruppe.owner_id == user {
            return Err(ChatError::nicht_autorisiert(
                "Der Owner kann die Gruppe nicht verlassen",
            ));
        }
        if !self.repo.mitglied_entfernen(group_id, user).await? {
            return Err(ChatError::nicht_gefunden("Mitgliedschaft"));
        }
        tracing::info!(group_id = %group_id, user_id = %user, "Secret-Group verlassen");
        Ok(())
    }

    /// Entfernt ein Mitglied (nur Owner)
    pub async fn mitglied_entfernen(
        &self,
        group_id: ObjektId,
        aufrufer: ObjektId,
        ziel: ObjektId,
    ) -> ChatResult<()> {
        let gruppe = self.gruppe_laden(group_id).await?;
        if gruppe.owner_id != aufrufer {
            return Err(ChatError::nicht_autorisiert("Nur der Owner kann Mitglieder entfernen"));
        }
        if ziel == gruppe.owner_id {
            return Err(ChatError::UngueltigeEingabe(
                "Der Owner kann nicht entfernt werden".into(),
            ));
        }
        if !self.repo.mitglied_entfernen(group_id, ziel).await? {
            return Err(ChatError::nicht_gefunden("Mitgliedschaft"));
        }
        tracing::info!(group_id = %group_id, user_id = %ziel, "Mitglied entfernt");
        Ok(())
    }

    /// Bannt einen Benutzer (nur Admins)
    pub async fn bannen(&self, group_id: ObjektId, aufrufer: ObjektId, ziel: ObjektId) -> ChatResult<()> {
        let gruppe = self.gruppe_laden(group_id).await?;
        if !gruppe.ist_admin(&aufrufer) {
            return Err(ChatError::nicht_autorisiert("Nur Admins koennen bannen"));
        }
        if ziel == gruppe.owner_id || ziel == aufrufer {
            return Err(ChatError::UngueltigeEingabe(
                "Owner und man selbst koennen nicht gebannt werden".into(),
            ));
        }
        self.repo.bannen(group_id, ziel).await?;
        tracing::info!(group_id = %group_id, user_id = %ziel, admin = %aufrufer, "Benutzer gebannt");
        Ok(())
    }

    /// Hebt einen Bann auf (nur Admins). Mit hinterlegtem Public Key wird der
    /// Benutzer wieder Mitglied, sonst muss er ueber den Link neu beitreten.
    pub async fn entbannen(&self, group_id: ObjektId, aufrufer: ObjektId, ziel: ObjektId) -> ChatResult<()> {
        let gruppe = self.gruppe_laden(group_id).await?;
        if !gruppe.ist_admin(&aufrufer) {
            return Err(ChatError::nicht_autorisiert("Nur Admins koennen entbannen"));
        }
        if !self.repo.entbannen(group_id, ziel).await? {
            return Err(ChatError::nicht_gefunden("Bann"));
        }
        tracing::info!(group_id = %group_id, user_id = %ziel, admin = %aufrufer, "Bann aufgehoben");
        Ok(())
    }

    /// Mitglieder mit Public Keys (Grundlage fuer das Wrappen des Gruppenschluessels)
    pub async fn mitglieder(
        &self,
        group_id: ObjektId,
        aufrufer: ObjektId,
    ) -> ChatResult<Vec<SecretGroupMitglied>> {
        self.laden(group_id, aufrufer).await?;
        Ok(self.repo.mitglieder(group_id).await?)
    }

    /// Verlauf; Inhalte bleiben Client-Ciphertext
    pub async fn nachrichten(
        &self,
        group_id: ObjektId,
        aufrufer: ObjektId,
        seite: Seite,
    ) -> ChatResult<Vec<NachrichtRecord>> {
        self.laden(group_id, aufrufer).await?;
        let mut nachrichten = self.repo.gruppen_verlauf(group_id, seite).await?;
        for n in nachrichten.iter_mut().filter(|n| n.ist_geloescht_fuer(&aufrufer)) {
            ausblenden(n);
        }
        Ok(nachrichten)
    }

    /// Loescht die Gruppe samt Mitgliedschaften und Nachrichten (nur Owner)
    pub async fn loeschen(&self, group_id: ObjektId, aufrufer: ObjektId) -> ChatResult<()> {
        let gruppe = self.gruppe_laden(group_id).await?;
        if gruppe.owner_id != aufrufer {
            return Err(ChatError::nicht_autorisiert("Nur der Owner kann die Gruppe loeschen"));
        }
        SecretGroupRepository::delete(self.repo.as_ref(), group_id).await?;
        tracing::info!(group_id = %group_id, "Secret-Group geloescht");
        Ok(())
    }

    /// Ob `user` aktives Mitglied ist (fuer die Zulassung zu Live-Verbindungen)
    pub async fn ist_mitglied(&self, group_id: ObjektId, user: ObjektId) -> ChatResult<bool> {
        Ok(self
            .repo
            .mitglied(group_id, user)
            .await?
            .is_some_and(|m| m.status == hushline_db::models::MitgliedStatus::Member))
    }

    async fn gruppe_laden(&self, group_id: ObjektId) -> ChatResult<SecretGroupRecord> {
        SecretGroupRepository::get(self.repo.as_ref(), group_id)
            .await?
            .ok_or_else(|| ChatError::nicht_gefunden(format!("Secret-Group {group_id}")))
    }
}
