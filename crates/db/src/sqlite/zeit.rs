//! Gemeinsame Konvertierungen zwischen Zeilen und Domain-Typen

use chrono::{DateTime, SecondsFormat, Utc};
use hushline_core::ObjektId;
use sqlx::sqlite::SqliteRow;
use sqlx::Row as _;

use crate::error::DbError;
use crate::repository::DbResult;

/// RFC3339 mit Mikrosekunden, lexikografisch sortierbar
pub(crate) fn zeit_formatieren(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn jetzt() -> String {
    zeit_formatieren(Utc::now())
}

pub(crate) fn parse_timestamp(s: String) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Fallback fuer SQLite datetime()-Format
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").map(|n| n.and_utc())
        })
        .map_err(|e| DbError::intern(format!("Ungueltige Zeitangabe '{s}': {e}")))
}

pub(crate) fn id_lesen(row: &SqliteRow, spalte: &str) -> DbResult<ObjektId> {
    let roh: String = row.try_get(spalte)?;
    roh.parse()
        .map_err(|_| DbError::intern(format!("Ungueltige ID in Spalte {spalte}: '{roh}'")))
}

pub(crate) fn optionale_id_lesen(row: &SqliteRow, spalte: &str) -> DbResult<Option<ObjektId>> {
    let roh: Option<String> = row.try_get(spalte)?;
    roh.filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| DbError::intern(format!("Ungueltige ID in Spalte {spalte}: '{s}'")))
        })
        .transpose()
}

pub(crate) fn optionale_zeit_lesen(
    row: &SqliteRow,
    spalte: &str,
) -> DbResult<Option<DateTime<Utc>>> {
    let roh: Option<String> = row.try_get(spalte)?;
    roh.map(parse_timestamp).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeitformat_roundtrip() {
        let t = Utc::now();
        let s = zeit_formatieren(t);
        assert!(s.ends_with('Z'));
        let zurueck = parse_timestamp(s).unwrap();
        assert_eq!(zurueck.timestamp_micros(), t.timestamp_micros());
    }

    #[test]
    fn sqlite_datetime_fallback() {
        let t = parse_timestamp("2024-05-01 12:30:00".into()).unwrap();
        assert_eq!(t.timestamp(), 1_714_566_600);
    }

    #[test]
    fn zeitformat_ist_sortierbar() {
        let a = zeit_formatieren(DateTime::from_timestamp(1_000, 5_000).unwrap());
        let b = zeit_formatieren(DateTime::from_timestamp(1_000, 900_000_000).unwrap());
        assert!(a < b);
    }
}
