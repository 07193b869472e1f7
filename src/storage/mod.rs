use crate::error::StoreResult;
use crate::models::{NewPaste, Paste};

pub mod memory;
pub mod sql;

/// Durable keyed storage for pastes.
///
/// Implementations own expiry: once a paste's `expires_at` has passed it must not be
/// returned by [`find_by_code`](PasteStore::find_by_code), whether or not it has been
/// swept yet.
#[allow(async_fn_in_trait)]
pub trait PasteStore {
    /// Look up a live paste by code.
    async fn find_by_code(&self, code: &str) -> StoreResult<Option<Paste>>;

    /// Insert a paste, failing with `DuplicateKey` if a live paste holds the code.
    async fn insert(&self, paste: &NewPaste) -> StoreResult<Paste>;

    /// Physically remove expired pastes, returning how many were removed.
    async fn purge_expired(&self) -> StoreResult<u64>;
}

#[derive(Clone, Debug)]
pub enum AnyStore {
    Sql(sql::SqlStore),
    Memory(memory::MemoryStore),
}

impl PasteStore for AnyStore {
    async fn find_by_code(&self, code: &str) -> StoreResult<Option<Paste>> {
        match self {
            AnyStore::Sql(sql) => sql.find_by_code(code).await,
            AnyStore::Memory(memory) => memory.find_by_code(code).await,
        }
    }

    async fn insert(&self, paste: &NewPaste) -> StoreResult<Paste> {
        match self {
            AnyStore::Sql(sql) => sql.insert(paste).await,
            AnyStore::Memory(memory) => memory.insert(paste).await,
        }
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        match self {
            AnyStore::Sql(sql) => sql.purge_expired().await,
            AnyStore::Memory(memory) => memory.purge_expired().await,
        }
    }
}

impl From<sql::SqlStore> for AnyStore {
    fn from(value: sql::SqlStore) -> Self {
        AnyStore::Sql(value)
    }
}

impl From<memory::MemoryStore> for AnyStore {
    fn from(value: memory::MemoryStore) -> Self {
        AnyStore::Memory(value)
    }
}
