//! SQLite-Implementierung des SecretGroupRepository
//!
//! Mitgliedschaften liegen als Zeilen in `secret_group_members`. Der
//! Primaerschluessel (group_id, user_id) garantiert, dass ein Benutzer
//! entweder Mitglied oder gebannt ist, und macht den Beitritt zu einem
//! einzelnen INSERT.

use std::collections::BTreeMap;

use async_trait::async_trait;
use hushline_core::ObjektId;
use sqlx::sqlite::SqliteRow;
use sqlx::Row as _;

use crate::error::DbError;
use crate::models::{
    BeitrittsErgebnis, GruppenTyp, MitgliedStatus, NeueSecretGroup, SecretGroupMitglied,
    SecretGroupRecord,
};
use crate::repository::{DbResult, SecretGroupRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::zeit::{id_lesen, jetzt, parse_timestamp};

const MITGLIED_SPALTEN: &str = "group_id, user_id, status, is_admin, public_key, joined_at";

impl SqliteDb {
    async fn gruppe_zusammensetzen(&self, row: &SqliteRow) -> DbResult<SecretGroupRecord> {
        let id = id_lesen(row, "id")?;
        let typ: String = row.try_get("group_type")?;

        let mitglieder_rows = sqlx::query(&format!(
            "SELECT {MITGLIED_SPALTEN} FROM secret_group_members
             WHERE group_id = ? ORDER BY joined_at ASC"
        ))
        .bind(id.to_hex())
        .fetch_all(&self.pool)
        .await?;

        let mut gruppe = SecretGroupRecord {
            id,
            owner_id: id_lesen(row, "owner_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            group_type: typ.parse::<GruppenTyp>().map_err(DbError::UngueltigeDaten)?,
            invite_link: row.try_get("invite_link")?,
            admins: Vec::new(),
            members: Vec::new(),
            banned_members: Vec::new(),
            user_public_keys: BTreeMap::new(),
            join_times: BTreeMap::new(),
            created_at: parse_timestamp(row.try_get("created_at")?)?,
        };

        for r in &mitglieder_rows {
            let m = row_to_mitglied(r)?;
            match m.status {
                MitgliedStatus::Banned => gruppe.banned_members.push(m.user_id),
                MitgliedStatus::Member => {
                    let schluessel = m.user_id.to_hex();
                    if m.is_admin {
                        gruppe.admins.push(m.user_id);
                    }
                    gruppe.members.push(m.user_id);
                    gruppe.user_public_keys.insert(schluessel.clone(), m.public_key);
                    gruppe.join_times.insert(schluessel, m.joined_at);
                }
            }
        }

        Ok(gruppe)
    }
}

#[async_trait]
impl SecretGroupRepository for SqliteDb {
    async fn create(&self, daten: NeueSecretGroup) -> DbResult<SecretGroupRecord> {
        let id = ObjektId::neu();
        let jetzt = jetzt();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO secret_groups
             (id, owner_id, name, description, group_type, invite_link, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_hex())
        .bind(daten.owner_id.to_hex())
        .bind(&daten.name)
        .bind(&daten.description)
        .bind(daten.group_type.als_str())
        .bind(&daten.invite_link)
        .bind(&jetzt)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                DbError::Eindeutigkeit(format!("Einladungslink '{}'", daten.invite_link))
            }
            other => DbError::Sqlx(other),
        })?;

        sqlx::query(
            "INSERT INTO secret_group_members
             (group_id, user_id, status, is_admin, public_key, joined_at)
             VALUES (?, ?, 'member', 1, ?, ?)",
        )
        .bind(id.to_hex())
        .bind(daten.owner_id.to_hex())
        .bind(&daten.owner_public_key)
        .bind(&jetzt)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        SecretGroupRepository::get(self, id)
            .await?
            .ok_or_else(|| DbError::intern("Secret-Group nach Erstellung nicht gefunden"))
    }

    async fn get(&self, id: ObjektId) -> DbResult<Option<SecretGroupRecord>> {
        let row = sqlx::query(
            "SELECT id, owner_id, name, description, group_type, invite_link, created_at
             FROM secret_groups WHERE id = ?",
        )
        .bind(id.to_hex())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(self.gruppe_zusammensetzen(&r).await?)),
            None => Ok(None),
        }
    }

    async fn get_nach_einladung(&self, invite_link: &str) -> DbResult<Option<SecretGroupRecord>> {
        let row = sqlx::query(
            "SELECT id, owner_id, name, description, group_type, invite_link, created_at
             FROM secret_groups WHERE invite_link = ?",
        )
        .bind(invite_link)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(self.gruppe_zusammensetzen(&r).await?)),
            None => Ok(None),
        }
    }

    async fn fuer_mitglied(&self, user: ObjektId) -> DbResult<Vec<SecretGroupRecord>> {
        let rows = sqlx::query(
            "SELECT g.id, g.owner_id, g.name, g.description, g.group_type, g.invite_link,
                    g.created_at
             FROM secret_groups g
             JOIN secret_group_members m ON m.group_id = g.id
             WHERE m.user_id = ? AND m.status = 'member'
             ORDER BY g.created_at ASC",
        )
        .bind(user.to_hex())
        .fetch_all(&self.pool)
        .await?;

        let mut gruppen = Vec::with_capacity(rows.len());
        for r in &rows {
            gruppen.push(self.gruppe_zusammensetzen(r).await?);
        }
        Ok(gruppen)
    }

    async fn beitreten(
        &self,
        group_id: ObjektId,
        user_id: ObjektId,
        public_key: &str,
    ) -> DbResult<BeitrittsErgebnis> {
        let joined_at = jetzt();

        let eingefuegt = sqlx::query(
            "INSERT INTO secret_group_members
             (group_id, user_id, status, is_admin, public_key, joined_at)
             VALUES (?, ?, 'member', 0, ?, ?)
             ON CONFLICT (group_id, user_id) DO NOTHING",
        )
        .bind(group_id.to_hex())
        .bind(user_id.to_hex())
        .bind(public_key)
        .bind(&joined_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if eingefuegt > 0 {
            return Ok(BeitrittsErgebnis::Beigetreten(SecretGroupMitglied {
                group_id,
                user_id,
                status: MitgliedStatus::Member,
                is_admin: false,
                public_key: public_key.to_string(),
                joined_at: parse_timestamp(joined_at)?,
            }));
        }

        // Konflikt: bestehende Zeile entscheidet ueber den Grund
        match self.mitglied(group_id, user_id).await? {
            Some(m) if m.status == MitgliedStatus::Banned => Ok(BeitrittsErgebnis::Gebannt),
            Some(_) => Ok(BeitrittsErgebnis::BereitsMitglied),
            None => Err(DbError::intern(format!(
                "Beitritt zu {group_id} weder eingefuegt noch vorhanden"
            ))),
        }
    }

    async fn mitglied(
        &self,
        group_id: ObjektId,
        user_id: ObjektId,
    ) -> DbResult<Option<SecretGroupMitglied>> {
        let row = sqlx::query(&format!(
            "SELECT {MITGLIED_SPALTEN} FROM secret_group_members
             WHERE group_id = ? AND user_id = ?"
        ))
        .bind(group_id.to_hex())
        .bind(user_id.to_hex())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_mitglied).transpose()
    }

    async fn mitglieder(&self, group_id: ObjektId) -> DbResult<Vec<SecretGroupMitglied>> {
        let rows = sqlx::query(&format!(
            "SELECT {MITGLIED_SPALTEN} FROM secret_group_members
             WHERE group_id = ? AND status = 'member'
             ORDER BY joined_at ASC"
        ))
        .bind(group_id.to_hex())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_mitglied).collect()
    }

    async fn mitglied_entfernen(&self, group_id: ObjektId, user_id: ObjektId) -> DbResult<bool> {
        let affected = sqlx::query(
            "DELETE FROM secret_group_members
             WHERE group_id = ? AND user_id = ? AND status = 'member'",
        )
        .bind(group_id.to_hex())
        .bind(user_id.to_hex())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn bannen(&self, group_id: ObjektId, user_id: ObjektId) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO secret_group_members
             (group_id, user_id, status, is_admin, public_key, joined_at)
             VALUES (?, ?, 'banned', 0, '', ?)
             ON CONFLICT (group_id, user_id) DO UPDATE
             SET status = 'banned', is_admin = 0",
        )
        .bind(group_id.to_hex())
        .bind(user_id.to_hex())
        .bind(jetzt())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn entbannen(&self, group_id: ObjektId, user_id: ObjektId) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let wiederhergestellt = sqlx::query(
            "UPDATE secret_group_members SET status = 'member', joined_at = ?
             WHERE group_id = ? AND user_id = ? AND status = 'banned' AND public_key <> ''",
        )
        .bind(jetzt())
        .bind(group_id.to_hex())
        .bind(user_id.to_hex())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        // Ohne Public Key kein Mitglied: Beitritt erneut ueber den Einladungslink
        let entfernt = sqlx::query(
            "DELETE FROM secret_group_members
             WHERE group_id = ? AND user_id = ? AND status = 'banned' AND public_key = ''",
        )
        .bind(group_id.to_hex())
        .bind(user_id.to_hex())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(wiederhergestellt + entfernt > 0)
    }

    async fn delete(&self, id: ObjektId) -> DbResult<bool> {
        let id_hex = id.to_hex();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM messages WHERE group_id = ?")
            .bind(&id_hex)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM secret_group_members WHERE group_id = ?")
            .bind(&id_hex)
            .execute(&mut *tx)
            .await?;

        let affected = sqlx::query("DELETE FROM secret_groups WHERE id = ?")
            .bind(&id_hex)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(affected > 0)
    }
}

fn row_to_mitglied(row: &SqliteRow) -> DbResult<SecretGroupMitglied> {
    let status: String = row.try_get("status")?;
    Ok(SecretGroupMitglied {
        group_id: id_lesen(row, "group_id")?,
        user_id: id_lesen(row, "user_id")?,
        status: status.parse().map_err(DbError::UngueltigeDaten)?,
        is_admin: row.try_get("is_admin")?,
        public_key: row.try_get("public_key")?,
        joined_at: parse_timestamp(row.try_get("joined_at")?)?,
    })
}
