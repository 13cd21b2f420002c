//! REST-Handler Module

pub mod hub;
pub mod nachrichten;
pub mod secret_chats;
pub mod secret_groups;

use serde::Deserialize;

/// Seitenparameter fuer Verlaufsabfragen (`?page=1&limit=50`)
#[derive(Debug, Deserialize)]
pub struct SeitenParameter {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl SeitenParameter {
    pub fn seite(&self) -> hushline_db::models::Seite {
        let standard = hushline_db::models::Seite::default();
        hushline_db::models::Seite::neu(
            self.page.unwrap_or(standard.page),
            self.limit.unwrap_or(standard.limit),
        )
    }
}
