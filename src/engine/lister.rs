//! Materializes the full record-id set before any deletion starts.

use crate::engine::pool::ConnectionPool;
use crate::error::{PurgeError, Result};
use crate::store::{Credential, RecordId};
use tracing::debug;

/// Page through `collection` until the store reports no further pages and
/// return every id discovered, in discovery order.
///
/// An empty collection yields an empty vec, not an error. Page failures are
/// not retried here; retry belongs to the orchestrator's outer loop, which
/// treats any failure in this function as fatal to the attempt.
pub async fn list_all(
    pool: &ConnectionPool,
    credential: &Credential,
    collection: &str,
    page_size: u32,
) -> Result<Vec<RecordId>> {
    let connection = pool
        .get(credential)
        .await
        .map_err(|e| PurgeError::List(e.to_string()))?;
    let mut connection = connection.lock().await;

    let mut ids = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = connection
            .list_page(collection, page_size, cursor.as_deref())
            .await
            .map_err(|e| PurgeError::List(e.to_string()))?;

        ids.extend(page.ids);
        debug!(fetched = ids.len(), "listed page");

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(ids)
}
