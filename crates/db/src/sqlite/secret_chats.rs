//! SQLite-Implementierung des SecretChatRepository
//!
//! Einmal-Zuweisungen (Public Keys, finale Schluessel) laufen als bedingte
//! UPDATEs, damit zwei gleichzeitige Uploads nicht beide gewinnen koennen.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hushline_core::ObjektId;
use sqlx::sqlite::SqliteRow;
use sqlx::Row as _;

use crate::error::DbError;
use crate::models::SecretChatRecord;
use crate::repository::{DbResult, SecretChatRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::zeit::{id_lesen, jetzt, optionale_zeit_lesen, parse_timestamp, zeit_formatieren};

/// Reihenfolge-unabhaengiger Schluessel fuer ein Benutzerpaar
pub(crate) fn paar_schluessel(a: &ObjektId, b: &ObjektId) -> String {
    let (a, b) = (a.to_hex(), b.to_hex());
    if a <= b {
        format!("{a}|{b}")
    } else {
        format!("{b}|{a}")
    }
}

#[async_trait]
impl SecretChatRepository for SqliteDb {
    async fn create(
        &self,
        user_1: ObjektId,
        user_2: ObjektId,
        expire_at: Option<DateTime<Utc>>,
    ) -> DbResult<SecretChatRecord> {
        let id = ObjektId::neu();
        let created_at = jetzt();
        let paar = paar_schluessel(&user_1, &user_2);
        let mut tx = self.pool.begin().await?;

        // Abgelaufener Chat desselben Paars blockiert den pair_key nicht
        let abgelaufen: Option<String> = sqlx::query_scalar(
            "SELECT id FROM secret_chats
             WHERE pair_key = ? AND expire_at IS NOT NULL AND expire_at <= ?",
        )
        .bind(&paar)
        .bind(&created_at)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(alt) = abgelaufen {
            sqlx::query("DELETE FROM messages WHERE chat_id = ?")
                .bind(&alt)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM secret_chats WHERE id = ?")
                .bind(&alt)
                .execute(&mut *tx)
                .await?;
            tracing::debug!(chat_id = %alt, "Abgelaufener Secret-Chat ersetzt");
        }

        sqlx::query(
            "INSERT INTO secret_chats (id, user_1, user_2, pair_key, expire_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_hex())
        .bind(user_1.to_hex())
        .bind(user_2.to_hex())
        .bind(&paar)
        .bind(expire_at.map(zeit_formatieren))
        .bind(&created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                DbError::Eindeutigkeit(format!("Secret-Chat {user_1} <-> {user_2}"))
            }
            other => DbError::Sqlx(other),
        })?;

        tx.commit().await?;

        Ok(SecretChatRecord {
            id,
            user_1,
            user_2,
            user_1_public_key: String::new(),
            user_2_public_key: String::new(),
            user_1_encrypted_symmetric_key: String::new(),
            user_2_encrypted_symmetric_key: String::new(),
            user_2_accepted: false,
            key_finalized: false,
            expire_at,
            created_at: parse_timestamp(created_at)?,
        })
    }

    async fn get(&self, id: ObjektId) -> DbResult<Option<SecretChatRecord>> {
        let row = sqlx::query(
            "SELECT id, user_1, user_2, user_1_public_key, user_2_public_key,
                    user_1_encrypted_symmetric_key, user_2_encrypted_symmetric_key,
                    user_2_accepted, key_finalized, expire_at, created_at
             FROM secret_chats WHERE id = ?",
        )
        .bind(id.to_hex())
        .fetch_optional(&self.pool)
        .await?;

        let chat = match row {
            Some(r) => row_to_secret_chat(&r)?,
            None => return Ok(None),
        };

        if chat.ist_abgelaufen(Utc::now()) {
            tracing::debug!(chat_id = %id, "Secret-Chat abgelaufen");
            return Ok(None);
        }
        Ok(Some(chat))
    }

    async fn fuer_teilnehmer(&self, user: ObjektId) -> DbResult<Vec<SecretChatRecord>> {
        let user_hex = user.to_hex();
        let rows = sqlx::query(
            "SELECT id, user_1, user_2, user_1_public_key, user_2_public_key,
                    user_1_encrypted_symmetric_key, user_2_encrypted_symmetric_key,
                    user_2_accepted, key_finalized, expire_at, created_at
             FROM secret_chats
             WHERE (user_1 = ? OR user_2 = ?)
               AND (expire_at IS NULL OR expire_at > ?)
             ORDER BY created_at ASC",
        )
        .bind(&user_hex)
        .bind(&user_hex)
        .bind(jetzt())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_secret_chat).collect()
    }

    async fn public_key_setzen(
        &self,
        id: ObjektId,
        user: ObjektId,
        key: &str,
    ) -> DbResult<bool> {
        let id_hex = id.to_hex();
        let user_hex = user.to_hex();

        // Genau eine der beiden Anweisungen kann greifen
        let erster = sqlx::query(
            "UPDATE secret_chats SET user_1_public_key = ?
             WHERE id = ? AND user_1 = ? AND user_1_public_key = ''",
        )
        .bind(key)
        .bind(&id_hex)
        .bind(&user_hex)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if erster > 0 {
            return Ok(true);
        }

        let zweiter = sqlx::query(
            "UPDATE secret_chats SET user_2_public_key = ?
             WHERE id = ? AND user_2 = ? AND user_2_public_key = ''",
        )
        .bind(key)
        .bind(&id_hex)
        .bind(&user_hex)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(zweiter > 0)
    }

    async fn symmetrische_keys_setzen(
        &self,
        id: ObjektId,
        user_1_key: &str,
        user_2_key: &str,
    ) -> DbResult<bool> {
        let affected = sqlx::query(
            "UPDATE secret_chats
             SET user_1_encrypted_symmetric_key = ?,
                 user_2_encrypted_symmetric_key = ?,
                 key_finalized = 1
             WHERE id = ?
               AND key_finalized = 0
               AND user_1_public_key <> ''
               AND user_2_public_key <> ''",
        )
        .bind(user_1_key)
        .bind(user_2_key)
        .bind(id.to_hex())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn akzeptieren(&self, id: ObjektId) -> DbResult<bool> {
        let affected = sqlx::query("UPDATE secret_chats SET user_2_accepted = 1 WHERE id = ?")
            .bind(id.to_hex())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(affected > 0)
    }

    async fn delete(&self, id: ObjektId) -> DbResult<bool> {
        let id_hex = id.to_hex();
        let mut tx = self.pool.begin().await?;

        let nachrichten = sqlx::query("DELETE FROM messages WHERE chat_id = ?")
            .bind(&id_hex)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let affected = sqlx::query("DELETE FROM secret_chats WHERE id = ?")
            .bind(&id_hex)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        tracing::debug!(chat_id = %id, nachrichten, "Secret-Chat geloescht");
        Ok(affected > 0)
    }
}

fn row_to_secret_chat(row: &SqliteRow) -> DbResult<SecretChatRecord> {
    Ok(SecretChatRecord {
        id: id_lesen(row, "id")?,
        user_1: id_lesen(row, "user_1")?,
        user_2: id_lesen(row, "user_2")?,
        user_1_public_key: row.try_get("user_1_public_key")?,
        user_2_public_key: row.try_get("user_2_public_key")?,
        user_1_encrypted_symmetric_key: row.try_get("user_1_encrypted_symmetric_key")?,
        user_2_encrypted_symmetric_key: row.try_get("user_2_encrypted_symmetric_key")?,
        user_2_accepted: row.try_get("user_2_accepted")?,
        key_finalized: row.try_get("key_finalized")?,
        expire_at: optionale_zeit_lesen(row, "expire_at")?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paar_schluessel_ist_symmetrisch() {
        let a = ObjektId::neu();
        let b = ObjektId::neu();
        assert_eq!(paar_schluessel(&a, &b), paar_schluessel(&b, &a));
        assert_ne!(paar_schluessel(&a, &a), paar_schluessel(&a, &b));
    }
}
