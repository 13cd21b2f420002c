//! SQLite-Implementierung des NachrichtenRepository

use async_trait::async_trait;
use hushline_core::ObjektId;
use sqlx::sqlite::SqliteRow;
use sqlx::Row as _;

use crate::error::DbError;
use crate::models::{InhaltsTyp, NachrichtRecord, NeueNachricht, Seite};
use crate::repository::{DbResult, NachrichtenRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::zeit::{
    id_lesen, jetzt, optionale_id_lesen, optionale_zeit_lesen, parse_timestamp, zeit_formatieren,
};

const SPALTEN: &str = "id, chat_id, group_id, sender_id, receiver_id, content_type, content,
     content_address, is_secret, is_deleted_for_sender, is_deleted_for_receiver,
     edited_at, created_at";

#[async_trait]
impl NachrichtenRepository for SqliteDb {
    async fn create(&self, daten: NeueNachricht) -> DbResult<NachrichtRecord> {
        let id = ObjektId::neu();
        let created_at = daten.created_at.map(zeit_formatieren).unwrap_or_else(jetzt);

        sqlx::query(
            "INSERT INTO messages
             (id, chat_id, group_id, sender_id, receiver_id, content_type, content,
              content_address, is_secret, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_hex())
        .bind(daten.chat_id.map(|i| i.to_hex()))
        .bind(daten.group_id.map(|i| i.to_hex()))
        .bind(daten.sender_id.to_hex())
        .bind(daten.receiver_id.map(|i| i.to_hex()))
        .bind(daten.content_type.als_str())
        .bind(&daten.content)
        .bind(&daten.content_address)
        .bind(daten.is_secret)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        Ok(NachrichtRecord {
            id,
            chat_id: daten.chat_id,
            group_id: daten.group_id,
            sender_id: daten.sender_id,
            receiver_id: daten.receiver_id,
            content_type: daten.content_type,
            content: daten.content,
            content_address: daten.content_address,
            is_secret: daten.is_secret,
            is_deleted_for_sender: false,
            is_deleted_for_receiver: false,
            edited_at: None,
            created_at: parse_timestamp(created_at)?,
        })
    }

    async fn get(&self, id: ObjektId) -> DbResult<Option<NachrichtRecord>> {
        let row = sqlx::query(&format!("SELECT {SPALTEN} FROM messages WHERE id = ?"))
            .bind(id.to_hex())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_nachricht).transpose()
    }

    async fn chat_verlauf(
        &self,
        chat_id: ObjektId,
        seite: Seite,
    ) -> DbResult<Vec<NachrichtRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SPALTEN} FROM messages
             WHERE chat_id = ?
             ORDER BY created_at ASC, rowid ASC
             LIMIT ? OFFSET ?"
        ))
        .bind(chat_id.to_hex())
        .bind(i64::from(seite.limit))
        .bind(seite.offset())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_nachricht).collect()
    }

    async fn gruppen_verlauf(
        &self,
        group_id: ObjektId,
        seite: Seite,
    ) -> DbResult<Vec<NachrichtRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SPALTEN} FROM messages
             WHERE group_id = ?
             ORDER BY created_at ASC, rowid ASC
             LIMIT ? OFFSET ?"
        ))
        .bind(group_id.to_hex())
        .bind(i64::from(seite.limit))
        .bind(seite.offset())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_nachricht).collect()
    }

    async fn update_content(&self, id: ObjektId, content: &str) -> DbResult<NachrichtRecord> {
        let affected = sqlx::query("UPDATE messages SET content = ?, edited_at = ? WHERE id = ?")
            .bind(content)
            .bind(jetzt())
            .bind(id.to_hex())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Nachricht {id}")));
        }

        NachrichtenRepository::get(self, id)
            .await?
            .ok_or_else(|| DbError::intern("Nachricht nach Update nicht gefunden"))
    }

    async fn fuer_sender_markieren(&self, id: ObjektId, sender: ObjektId) -> DbResult<bool> {
        let affected = sqlx::query(
            "UPDATE messages SET is_deleted_for_sender = 1 WHERE id = ? AND sender_id = ?",
        )
        .bind(id.to_hex())
        .bind(sender.to_hex())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn fuer_empfaenger_markieren(
        &self,
        id: ObjektId,
        empfaenger: ObjektId,
    ) -> DbResult<bool> {
        let affected = sqlx::query(
            "UPDATE messages SET is_deleted_for_receiver = 1 WHERE id = ? AND receiver_id = ?",
        )
        .bind(id.to_hex())
        .bind(empfaenger.to_hex())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn delete(&self, id: ObjektId) -> DbResult<bool> {
        let affected = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id.to_hex())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(affected > 0)
    }

    async fn chat_nachrichten_loeschen(&self, chat_id: ObjektId) -> DbResult<u64> {
        let affected = sqlx::query("DELETE FROM messages WHERE chat_id = ?")
            .bind(chat_id.to_hex())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(affected)
    }
}

pub(crate) fn row_to_nachricht(row: &SqliteRow) -> DbResult<NachrichtRecord> {
    let typ: String = row.try_get("content_type")?;
    let content_type = typ.parse::<InhaltsTyp>().map_err(DbError::UngueltigeDaten)?;

    Ok(NachrichtRecord {
        id: id_lesen(row, "id")?,
        chat_id: optionale_id_lesen(row, "chat_id")?,
        group_id: optionale_id_lesen(row, "group_id")?,
        sender_id: id_lesen(row, "sender_id")?,
        receiver_id: optionale_id_lesen(row, "receiver_id")?,
        content_type,
        content: row.try_get("content")?,
        content_address: row.try_get("content_address")?,
        is_secret: row.try_get("is_secret")?,
        is_deleted_for_sender: row.try_get("is_deleted_for_sender")?,
        is_deleted_for_receiver: row.try_get("is_deleted_for_receiver")?,
        edited_at: optionale_zeit_lesen(row, "edited_at")?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
    })
}
