use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{trace, warn};

use crate::errors::AppResult;
use crate::extract::PhotonDocument;

/// Producer handle for the durable indexing queue. Writes are
/// fire-and-forget: `enqueue` hands the document to a bounded channel and
/// returns immediately; one background task drains the channel into the
/// `photon_queue` table, where an external batch importer picks documents up.
#[derive(Clone)]
pub struct IndexWriter {
    tx: mpsc::Sender<PhotonDocument>,
}

impl IndexWriter {
    /// Spawns the drain task on the current tokio runtime.
    pub fn spawn(db: Arc<Mutex<Connection>>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<PhotonDocument>(capacity.max(1));
        tokio::spawn(async move {
            while let Some(document) = rx.recv().await {
                match persist_document(&db, &document) {
                    Ok(()) => trace!(id = document.id, kind = document.kind, "place document queued"),
                    Err(err) => warn!(?err, id = document.id, "indexing queue write failed"),
                }
            }
        });
        Self { tx }
    }

    /// Best-effort: a full or closed channel drops the document with a
    /// warning. Indexing is cache warming, never a correctness requirement.
    pub fn enqueue(&self, document: PhotonDocument) {
        match self.tx.try_send(document) {
            Ok(()) => {}
            Err(TrySendError::Full(document)) => {
                warn!(id = document.id, "indexing queue full; dropping document");
            }
            Err(TrySendError::Closed(document)) => {
                warn!(id = document.id, "indexing queue closed; dropping document");
            }
        }
    }
}

/// Insert-or-replace by identifier, so rediscovering a place is idempotent.
pub fn persist_document(db: &Mutex<Connection>, document: &PhotonDocument) -> AppResult<()> {
    let payload = serde_json::to_string(document)?;
    let conn = db.lock();
    conn.execute(
        "INSERT INTO photon_queue (id, document, queued_at)
        VALUES (?1, ?2, DATETIME('now'))
        ON CONFLICT(id) DO UPDATE SET
            document = excluded.document,
            queued_at = DATETIME('now')",
        (document.id.as_str(), payload.as_str()),
    )?;
    Ok(())
}

/// Depth of the durable queue. The core never consumes entries; this exists
/// for health reporting and tests.
pub fn pending_count(db: &Mutex<Connection>) -> AppResult<usize> {
    let conn = db.lock();
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM photon_queue", [], |row| row.get(0))?;
    Ok(count as usize)
}
