//! Record store contract.
//!
//! A store is shared by every tenant. Single-record reads go by id only;
//! the caller asserts ownership on what comes back. Multi-record reads
//! take a [`ScopedPredicate`], so a scan can never be issued without the
//! tenant condition.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::entity::{RecordId, TenantScoped};
use crate::errors::ScopeError;
use crate::page::Cursor;
use crate::predicate::ScopedPredicate;

pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Infrastructure failures raised by a store backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record already exists: {0}")]
    Conflict(RecordId),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for ScopeError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::Conflict(_) => ScopeError::conflict(err.to_string()),
            StoreError::Unavailable(_) => ScopeError::unavailable(err.to_string()),
        }
    }
}

#[async_trait]
pub trait RecordStore<E: TenantScoped>: Send + Sync {
    /// Persist a new record. Fails with `Conflict` if the id is taken.
    async fn insert(&self, record: E) -> StoreResult<()>;

    /// Look a record up by id alone, whatever its tenant.
    async fn fetch(&self, id: RecordId) -> StoreResult<Option<E>>;

    /// Records matching `predicate`, in `(created_at, id)` order, strictly
    /// after `after`, at most `limit` of them.
    async fn scan(
        &self,
        predicate: &ScopedPredicate,
        after: Option<Cursor>,
        limit: usize,
    ) -> StoreResult<Vec<E>>;

    /// Open a transaction. Writes staged on it are applied on `commit`
    /// and discarded if it is dropped.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx<E>>>;
}

#[async_trait]
pub trait StoreTx<E: TenantScoped>: Send {
    /// Read through the transaction, seeing its own staged writes.
    async fn fetch(&mut self, id: RecordId) -> StoreResult<Option<E>>;

    fn stage_put(&mut self, record: E);

    fn stage_delete(&mut self, id: RecordId);

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
