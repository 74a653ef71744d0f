//! Record store capability contract.
//!
//! The engine only depends on this narrow surface: open a connection with a
//! credential, list record ids page by page, and submit one best-effort
//! multi-delete per batch. The store's transaction semantics, throttling and
//! plugin pipeline stay behind this boundary.

pub mod dataverse;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub use dataverse::{DataverseConfig, DataverseStore};

/// Opaque identifier of one record in the target collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One authentication identity. Credentials are configured, not discovered;
/// each one enables one connection to the store.
#[derive(Clone, Deserialize)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for Credential {
    // Never leak the secret through Debug formatting
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// One page of listed record ids.
#[derive(Debug, Clone)]
pub struct ListPage {
    /// Ids discovered on this page, in store order
    pub ids: Vec<RecordId>,
    /// Cursor for the next page; `None` when the store has no further pages
    pub next_cursor: Option<String>,
}

/// Per-record result of a submitted bulk delete.
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub id: RecordId,
    /// Fault message when this record could not be deleted; `None` on success
    pub fault: Option<String>,
}

impl DeleteOutcome {
    pub fn succeeded(&self) -> bool {
        self.fault.is_none()
    }
}

/// Errors surfaced by a record store implementation
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response ({status}): {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A live authenticated session bound to exactly one credential.
///
/// Connections are treated as not safe for concurrent calls; the pool wraps
/// each one in a mutex and callers hold the lock for the duration of a call.
#[async_trait]
pub trait StoreConnection: Send {
    /// Fetch one page of record ids from `collection`.
    ///
    /// `cursor` is the token returned by the previous page, or `None` for the
    /// first page. An empty collection yields an empty page with no cursor.
    async fn list_page(
        &mut self,
        collection: &str,
        page_size: u32,
        cursor: Option<&str>,
    ) -> std::result::Result<ListPage, StoreError>;

    /// Submit one best-effort multi-delete for `ids`.
    ///
    /// The call errors only when the request itself cannot be submitted; a
    /// partially-faulted response is the expected outcome and is returned as
    /// one `DeleteOutcome` per id, in request order.
    async fn delete_many(
        &mut self,
        collection: &str,
        ids: &[RecordId],
    ) -> std::result::Result<Vec<DeleteOutcome>, StoreError>;
}

/// Factory for authenticated store connections.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Open a new connection for `credential`.
    async fn connect(
        &self,
        credential: &Credential,
    ) -> std::result::Result<Box<dyn StoreConnection>, StoreError>;
}
