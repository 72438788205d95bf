//! Tenant isolation enforcement.
//!
//! [`TenantScope`] is the only path services use to reach a
//! [`RecordStore`]. It is generic over [`TenantScoped`] and holds no state
//! besides the store handle: the tenant comes from the [`TenantContext`]
//! passed into each call.
//!
//! - creation stamps `ctx.tenant_id()` on the record, whatever the payload
//! - single-record reads fetch by id, then assert ownership
//! - listings scan with a [`ScopedPredicate`]
//! - mutations fetch, assert and write inside one store transaction

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::entity::{RecordId, TenantScoped};
use crate::errors::{ScopeError, ScopeResult};
use crate::page::{Cursor, Page, PageRequest};
use crate::predicate::{Predicate, ScopedPredicate};
use crate::reporter::Reporter;
use crate::store::{MemoryStore, RecordStore};
use crate::tenant::TenantContext;

pub struct TenantScope<E: TenantScoped> {
    store: Arc<dyn RecordStore<E>>,
}

impl<E: TenantScoped> Clone for TenantScope<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<E: TenantScoped> TenantScope<E> {
    pub fn new(store: Arc<dyn RecordStore<E>>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::<E>::new()))
    }

    pub async fn create(&self, ctx: &TenantContext, payload: E::Create) -> ScopeResult<E> {
        let record = E::from_create(RecordId::new(), ctx.tenant_id(), Utc::now(), payload);

        self.store
            .insert(record.clone())
            .await
            .map_err(ScopeError::from)?;

        debug!(
            tenant = %ctx.tenant_id(),
            collection = E::COLLECTION,
            record = %record.id(),
            "created"
        );
        Ok(record)
    }

    /// The record with `id` if it exists and belongs to the caller.
    pub async fn find(&self, ctx: &TenantContext, id: RecordId) -> ScopeResult<Option<E>> {
        let fetched = self.store.fetch(id).await.map_err(ScopeError::from)?;
        Ok(Reporter::owned(ctx, fetched))
    }

    pub async fn get(&self, ctx: &TenantContext, id: RecordId) -> ScopeResult<E> {
        let found = self.find(ctx, id).await?;
        found.ok_or_else(Reporter::not_found::<E>)
    }

    /// One page of the caller's records matching `filter`.
    pub async fn list(
        &self,
        ctx: &TenantContext,
        filter: Predicate,
        page: &PageRequest,
    ) -> ScopeResult<Page<E>> {
        let scoped = ScopedPredicate::new(ctx, filter);
        let limit = page.limit.max(1);

        debug!(collection = E::COLLECTION, predicate = %scoped, limit, "list");

        let mut rows = self
            .store
            .scan(&scoped, page.after, limit.saturating_add(1))
            .await
            .map_err(ScopeError::from)?;

        let next_page_token = if rows.len() > limit {
            rows.truncate(limit);
            rows.last().map(|r| Cursor::of(r).encode())
        } else {
            None
        };

        Ok(Page {
            data: rows,
            next_page_token,
            limit,
        })
    }

    pub async fn update(
        &self,
        ctx: &TenantContext,
        id: RecordId,
        patch: E::Patch,
    ) -> ScopeResult<E> {
        self.mutate(ctx, id, move |record, now| record.apply_patch(patch, now))
            .await
    }

    pub async fn replace(
        &self,
        ctx: &TenantContext,
        id: RecordId,
        payload: E::Create,
    ) -> ScopeResult<E> {
        self.mutate(ctx, id, move |record, now| record.replace(payload, now))
            .await
    }

    /// Delete and return the record.
    pub async fn delete(&self, ctx: &TenantContext, id: RecordId) -> ScopeResult<E> {
        let mut tx = self.store.begin().await.map_err(ScopeError::from)?;

        let fetched = tx.fetch(id).await.map_err(ScopeError::from)?;
        let current = Reporter::require(ctx, fetched)?;

        tx.stage_delete(id);
        tx.commit().await.map_err(ScopeError::from)?;

        debug!(
            tenant = %ctx.tenant_id(),
            collection = E::COLLECTION,
            record = %id,
            "deleted"
        );
        Ok(current)
    }

    async fn mutate<F>(&self, ctx: &TenantContext, id: RecordId, apply: F) -> ScopeResult<E>
    where
        F: FnOnce(&mut E, DateTime<Utc>) + Send,
    {
        let mut tx = self.store.begin().await.map_err(ScopeError::from)?;

        let fetched = tx.fetch(id).await.map_err(ScopeError::from)?;
        let mut record = Reporter::require(ctx, fetched)?;

        let (tenant_before, created_before) = (record.tenant_id(), record.created_at());
        apply(&mut record, Utc::now());

        if record.id() != id
            || record.tenant_id() != tenant_before
            || record.created_at() != created_before
        {
            return Err(ScopeError::general_error(format!(
                "{} mutation changed an immutable field",
                E::NOUN
            ))
            .into_anyhow());
        }

        tx.stage_put(record.clone());
        tx.commit().await.map_err(ScopeError::from)?;

        debug!(
            tenant = %ctx.tenant_id(),
            collection = E::COLLECTION,
            record = %id,
            "updated"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::testing::{ctx, new_note, tenant, Note, NotePatch};
    use std::collections::HashSet;

    fn kind(err: &anyhow::Error) -> ErrorKind {
        ScopeError::kind_of(err)
    }

    #[tokio::test]
    async fn create_stamps_the_context_tenant() {
        let scope = TenantScope::<Note>::in_memory();
        let a = ctx(tenant());

        let n = scope.create(&a, new_note("first", 1.0)).await.unwrap();

        assert_eq!(n.tenant_id, a.tenant_id());
        assert_eq!(scope.get(&a, n.id).await.unwrap(), n);
    }

    #[tokio::test]
    async fn foreign_get_is_indistinguishable_from_absent() {
        let scope = TenantScope::<Note>::in_memory();
        let a = ctx(tenant());
        let b = ctx(tenant());
        let theirs = scope.create(&b, new_note("theirs", 1.0)).await.unwrap();

        let foreign = scope.get(&a, theirs.id).await.unwrap_err();
        let absent = scope.get(&a, RecordId::new()).await.unwrap_err();

        assert_eq!(kind(&foreign), ErrorKind::NotFound);
        assert_eq!(
            ScopeError::from_anyhow(&foreign).unwrap().to_json(),
            ScopeError::from_anyhow(&absent).unwrap().to_json()
        );
        assert_eq!(scope.find(&a, theirs.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_only_returns_own_records_even_with_matching_filter() {
        let scope = TenantScope::<Note>::in_memory();
        let a = ctx(tenant());
        let b = ctx(tenant());

        scope.create(&a, new_note("Jane mine", 1.0)).await.unwrap();
        scope.create(&b, new_note("Jane theirs", 2.0)).await.unwrap();

        let page = scope
            .list(&a, Predicate::contains("title", "jane"), &PageRequest::default())
            .await
            .unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(page.data[0].title, "Jane mine");
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn pages_walk_every_own_record_exactly_once() {
        let scope = TenantScope::<Note>::in_memory();
        let a = ctx(tenant());
        let b = ctx(tenant());

        let mut mine = HashSet::new();
        for i in 0..7 {
            mine.insert(scope.create(&a, new_note(&format!("a{i}"), 0.0)).await.unwrap().id);
            scope.create(&b, new_note(&format!("b{i}"), 0.0)).await.unwrap();
        }

        let mut seen = HashSet::new();
        let mut request = PageRequest::first(3);
        loop {
            let page = scope.list(&a, Predicate::All, &request).await.unwrap();
            assert!(page.len() <= 3);
            for n in &page.data {
                assert!(seen.insert(n.id));
            }
            match page.next_page_token {
                Some(token) => request = PageRequest::first(3).after(Cursor::decode(&token).unwrap()),
                None => break,
            }
        }

        assert_eq!(seen, mine);
    }

    #[tokio::test]
    async fn foreign_mutations_fail_and_leave_the_record_alone() {
        let scope = TenantScope::<Note>::in_memory();
        let a = ctx(tenant());
        let b = ctx(tenant());
        let theirs = scope.create(&b, new_note("theirs", 1.0)).await.unwrap();

        let patch = NotePatch {
            title: Some("hijacked".into()),
            ..Default::default()
        };
        let err = scope.update(&a, theirs.id, patch).await.unwrap_err();
        assert_eq!(kind(&err), ErrorKind::NotFound);

        let err = scope
            .replace(&a, theirs.id, new_note("hijacked", 9.0))
            .await
            .unwrap_err();
        assert_eq!(kind(&err), ErrorKind::NotFound);

        let err = scope.delete(&a, theirs.id).await.unwrap_err();
        assert_eq!(kind(&err), ErrorKind::NotFound);

        assert_eq!(scope.get(&b, theirs.id).await.unwrap(), theirs);
    }

    #[tokio::test]
    async fn tenant_and_creation_time_survive_updates() {
        let scope = TenantScope::<Note>::in_memory();
        let a = ctx(tenant());
        let n = scope.create(&a, new_note("v1", 1.0)).await.unwrap();

        let patched = scope
            .update(&a, n.id, NotePatch { score: Some(2.0), ..Default::default() })
            .await
            .unwrap();
        let replaced = scope.replace(&a, n.id, new_note("v2", 3.0)).await.unwrap();

        for r in [&patched, &replaced] {
            assert_eq!(r.tenant_id, n.tenant_id);
            assert_eq!(r.created_at, n.created_at);
            assert_eq!(r.id, n.id);
        }
        assert_eq!(patched.title, "v1");
        assert_eq!(replaced.title, "v2");
    }

    #[tokio::test]
    async fn deleted_records_read_as_absent() {
        let scope = TenantScope::<Note>::in_memory();
        let a = ctx(tenant());
        let n = scope.create(&a, new_note("gone", 1.0)).await.unwrap();

        scope.delete(&a, n.id).await.unwrap();

        let err = scope.get(&a, n.id).await.unwrap_err();
        assert_eq!(kind(&err), ErrorKind::NotFound);
        let err = scope.delete(&a, n.id).await.unwrap_err();
        assert_eq!(kind(&err), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn unbounded_page_request_returns_everything_owned() {
        let scope = TenantScope::<Note>::in_memory();
        let a = ctx(tenant());
        for i in 0..3 {
            scope.create(&a, new_note(&format!("n{i}"), 0.0)).await.unwrap();
        }
        scope.create(&ctx(tenant()), new_note("theirs", 0.0)).await.unwrap();

        let page = scope
            .list(&a, Predicate::All, &PageRequest::first(usize::MAX))
            .await
            .unwrap();

        assert_eq!(page.len(), 3);
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn concurrent_tenants_never_see_each_other() {
        let scope = TenantScope::<Note>::in_memory();
        let tenants: Vec<_> = (0..8).map(|_| ctx(tenant())).collect();

        let mut tasks = Vec::new();
        for c in tenants.clone() {
            let scope = scope.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..10 {
                    let n = scope.create(&c, new_note(&format!("n{i}"), i as f64)).await?;
                    scope
                        .update(&c, n.id, NotePatch { score: Some(-1.0), ..Default::default() })
                        .await?;
                    let page = scope.list(&c, Predicate::All, &PageRequest::first(100)).await?;
                    assert!(page.data.iter().all(|r| r.tenant_id == c.tenant_id()));
                }
                anyhow::Ok(())
            }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        for c in &tenants {
            let page = scope.list(c, Predicate::All, &PageRequest::first(100)).await.unwrap();
            assert_eq!(page.len(), 10);
            assert!(page.data.iter().all(|r| r.tenant_id == c.tenant_id()));
        }
    }
}
