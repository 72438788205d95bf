use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use super::{RecordStore, StoreError, StoreResult, StoreTx};
use crate::entity::{RecordId, TenantScoped};
use crate::page::Cursor;
use crate::predicate::ScopedPredicate;

type Records<E> = BTreeMap<RecordId, E>;

/// In-memory store for one collection, shared by all tenants.
///
/// A transaction holds the collection's write lock until it is committed
/// or dropped, so a fetch-then-write inside it cannot interleave with
/// another writer.
pub struct MemoryStore<E> {
    records: Arc<RwLock<Records<E>>>,
}

impl<E> MemoryStore<E> {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

impl<E> Default for MemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for MemoryStore<E> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

#[async_trait]
impl<E: TenantScoped> RecordStore<E> for MemoryStore<E> {
    async fn insert(&self, record: E) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let id = record.id();
        if records.contains_key(&id) {
            return Err(StoreError::Conflict(id));
        }
        records.insert(id, record);
        Ok(())
    }

    async fn fetch(&self, id: RecordId) -> StoreResult<Option<E>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn scan(
        &self,
        predicate: &ScopedPredicate,
        after: Option<Cursor>,
        limit: usize,
    ) -> StoreResult<Vec<E>> {
        let records = self.records.read().await;

        let mut hits: Vec<&E> = records
            .values()
            .filter(|r| predicate.matches(*r))
            .filter(|r| after.is_none_or(|c| Cursor::of(*r) > c))
            .collect();
        hits.sort_by_key(|r| Cursor::of(*r));

        Ok(hits.into_iter().take(limit).cloned().collect())
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTx<E>>> {
        let guard = Arc::clone(&self.records).write_owned().await;
        Ok(Box::new(MemoryTx {
            guard,
            staged: Vec::new(),
        }))
    }
}

enum Staged<E> {
    Put(E),
    Delete(RecordId),
}

struct MemoryTx<E> {
    guard: OwnedRwLockWriteGuard<Records<E>>,
    staged: Vec<Staged<E>>,
}

#[async_trait]
impl<E: TenantScoped> StoreTx<E> for MemoryTx<E> {
    async fn fetch(&mut self, id: RecordId) -> StoreResult<Option<E>> {
        // Latest staged write for this id wins.
        for op in self.staged.iter().rev() {
            match op {
                Staged::Put(r) if r.id() == id => return Ok(Some(r.clone())),
                Staged::Delete(d) if *d == id => return Ok(None),
                _ => {}
            }
        }
        Ok(self.guard.get(&id).cloned())
    }

    fn stage_put(&mut self, record: E) {
        self.staged.push(Staged::Put(record));
    }

    fn stage_delete(&mut self, id: RecordId) {
        self.staged.push(Staged::Delete(id));
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, staged } = *self;
        for op in staged {
            match op {
                Staged::Put(r) => {
                    guard.insert(r.id(), r);
                }
                Staged::Delete(id) => {
                    guard.remove(&id);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Predicate;
    use crate::testing::{ctx, note, tenant, Note};
    use std::time::Duration;

    #[tokio::test]
    async fn insert_rejects_duplicate_ids() {
        let store = MemoryStore::<Note>::new();
        let n = note(tenant(), "a", 1.0);

        store.insert(n.clone()).await.unwrap();
        assert_eq!(store.insert(n.clone()).await, Err(StoreError::Conflict(n.id)));
    }

    #[tokio::test]
    async fn scan_is_scoped_ordered_and_resumable() {
        let store = MemoryStore::<Note>::new();
        let a = tenant();
        let b = tenant();

        for i in 0..5 {
            store.insert(note(a, &format!("a{i}"), i as f64)).await.unwrap();
            store.insert(note(b, &format!("b{i}"), i as f64)).await.unwrap();
        }

        let pred = ScopedPredicate::new(&ctx(a), Predicate::All);
        let first = store.scan(&pred, None, 3).await.unwrap();
        assert_eq!(first.len(), 3);
        assert!(first.iter().all(|n| n.tenant_id == a));
        assert!(first.windows(2).all(|w| Cursor::of(&w[0]) < Cursor::of(&w[1])));

        let rest = store
            .scan(&pred, Some(Cursor::of(&first[2])), 10)
            .await
            .unwrap();
        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|n| n.tenant_id == a));
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_store_untouched() {
        let store = MemoryStore::<Note>::new();
        let n = note(tenant(), "keep", 1.0);
        store.insert(n.clone()).await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            tx.stage_delete(n.id);
            assert_eq!(tx.fetch(n.id).await.unwrap(), None);
        }

        assert_eq!(store.fetch(n.id).await.unwrap(), Some(n));
    }

    #[tokio::test]
    async fn transaction_blocks_other_writers_until_commit() {
        let store = MemoryStore::<Note>::new();
        let n = note(tenant(), "x", 1.0);
        store.insert(n.clone()).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let other = store.clone();
        let late = note(tenant(), "late", 2.0);
        let late_id = late.id;
        let writer = tokio::spawn(async move { other.insert(late).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!writer.is_finished());

        tx.stage_delete(n.id);
        tx.commit().await.unwrap();
        writer.await.unwrap().unwrap();

        assert_eq!(store.fetch(n.id).await.unwrap(), None);
        assert!(store.fetch(late_id).await.unwrap().is_some());
    }
}
