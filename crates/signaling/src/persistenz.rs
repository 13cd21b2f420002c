//! Persistenz-Pipeline – Speichert Nachrichten unabhaengig von der Zustellung
//!
//! Sitzungen reihen fertige `NeueNachricht`-Datensaetze in eine begrenzte
//! Queue ein, ein Worker-Task schreibt sie in den Speicher. Ist die Queue
//! voll, uebernimmt ein Ueberlauf-Task den Datensatz; deren Anzahl ist durch
//! eine Semaphore begrenzt, darueber hinaus wird verworfen und gezaehlt. Die
//! Zustellung wartet nie auf die Datenbank.
//!
//! `created_at` wird beim Einreihen gesetzt, damit Ueberlauf-Schreibvorgaenge
//! die Verlaufsreihenfolge nicht verschieben.

use std::sync::Arc;

use chrono::Utc;
use hushline_db::{models::NeueNachricht, NachrichtenRepository};
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;

use crate::hub::HubZaehler;

/// Standardgroesse der Persistenz-Queue
pub const STANDARD_QUEUE_GROESSE: usize = 1024;

/// Handle zum Einreihen von Nachrichten (Clone teilt die Queue)
#[derive(Clone)]
pub struct Persistierer {
    tx: mpsc::Sender<NeueNachricht>,
    repo: Arc<dyn NachrichtenRepository>,
    zaehler: Arc<HubZaehler>,
    ueberlauf: Arc<Semaphore>,
    stopp: Arc<Notify>,
}

impl Persistierer {
    /// Startet den Worker-Task und gibt Handle und JoinHandle zurueck
    ///
    /// Gleichzeitig laufende Ueberlauf-Tasks sind auf `queue_groesse`
    /// begrenzt. Der Worker endet nach [`Persistierer::schliessen`] oder wenn
    /// alle Handles verworfen sind; vorher leert er die Queue und wartet auf
    /// laufende Ueberlauf-Schreibvorgaenge.
    pub fn starten(
        repo: Arc<dyn NachrichtenRepository>,
        queue_groesse: usize,
        zaehler: Arc<HubZaehler>,
    ) -> (Self, JoinHandle<()>) {
        let groesse = queue_groesse.max(1);
        let (tx, rx) = mpsc::channel::<NeueNachricht>(groesse);
        let ueberlauf = Arc::new(Semaphore::new(groesse));
        let stopp = Arc::new(Notify::new());

        let handle = tokio::spawn(worker(
            rx,
            Arc::clone(&repo),
            Arc::clone(&zaehler),
            Arc::clone(&ueberlauf),
            groesse,
            Arc::clone(&stopp),
        ));

        (
            Self {
                tx,
                repo,
                zaehler,
                ueberlauf,
                stopp,
            },
            handle,
        )
    }

    /// Reiht eine Nachricht ein, ohne zu warten
    pub fn einreihen(&self, mut nachricht: NeueNachricht) {
        nachricht.created_at.get_or_insert_with(Utc::now);

        match self.tx.try_send(nachricht) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(nachricht)) => {
                let Ok(erlaubnis) = Arc::clone(&self.ueberlauf).try_acquire_owned() else {
                    HubZaehler::erhoehen(&self.zaehler.persistenzfehler);
                    tracing::warn!(
                        sender = %nachricht.sender_id,
                        "Persistenz-Queue und Ueberlauf ausgelastet, Nachricht verworfen"
                    );
                    return;
                };
                tracing::debug!("Persistenz-Queue voll, Uebergabe an Ueberlauf-Task");
                let repo = Arc::clone(&self.repo);
                let zaehler = Arc::clone(&self.zaehler);
                tokio::spawn(async move {
                    speichern(repo.as_ref(), &zaehler, nachricht).await;
                    drop(erlaubnis);
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                HubZaehler::erhoehen(&self.zaehler.persistenzfehler);
                tracing::error!("Persistenz-Worker nicht mehr aktiv, Nachricht verworfen");
            }
        }
    }

    /// Nimmt keine neuen Nachrichten mehr an; der Worker schreibt den Rest
    /// und endet
    pub fn schliessen(&self) {
        self.stopp.notify_one();
    }
}

async fn worker(
    mut rx: mpsc::Receiver<NeueNachricht>,
    repo: Arc<dyn NachrichtenRepository>,
    zaehler: Arc<HubZaehler>,
    ueberlauf: Arc<Semaphore>,
    ueberlauf_grenze: usize,
    stopp: Arc<Notify>,
) {
    tracing::debug!("Persistenz-Worker gestartet");
    loop {
        tokio::select! {
            naechste = rx.recv() => match naechste {
                Some(nachricht) => speichern(repo.as_ref(), &zaehler, nachricht).await,
                None => break,
            },
            _ = stopp.notified() => {
                rx.close();
                let mut rest = 0usize;
                while let Some(nachricht) = rx.recv().await {
                    speichern(repo.as_ref(), &zaehler, nachricht).await;
                    rest += 1;
                }
                tracing::debug!(rest, "Persistenz-Queue geleert");
                break;
            }
        }
    }

    // Alle Erlaubnisse zurueck heisst: kein Ueberlauf-Task schreibt mehr
    let grenze = u32::try_from(ueberlauf_grenze).unwrap_or(u32::MAX);
    if ueberlauf.acquire_many(grenze).await.is_err() {
        tracing::debug!("Ueberlauf-Semaphore geschlossen");
    }
    tracing::debug!("Persistenz-Worker beendet");
}

async fn speichern(repo: &dyn NachrichtenRepository, zaehler: &HubZaehler, nachricht: NeueNachricht) {
    let sender = nachricht.sender_id;
    match repo.create(nachricht).await {
        Ok(record) => {
            tracing::trace!(nachricht_id = %record.id, sender = %sender, "Nachricht gespeichert");
        }
        Err(e) => {
            HubZaehler::erhoehen(&zaehler.persistenzfehler);
            tracing::error!(sender = %sender, fehler = %e, "Nachricht konnte nicht gespeichert werden");
        }
    }
}
