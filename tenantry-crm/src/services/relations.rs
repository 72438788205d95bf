//! Hooks tying collections together.
//!
//! All of them go through the tenant-scoped services of the same app, so
//! a reference can only ever resolve inside the caller's tenant and a
//! cascade can only ever reach the caller's own records.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tenantry_core::{
    AfterHook, AroundHook, BeforeHook, ErrorKind, HookContext, HookResult, Next, ScopeError,
    TenantId,
};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::CrmParams;

/// Batch size used when a cascade walks dependent records.
const CASCADE_BATCH: usize = 100;

/// One lock per tenant, shared by every hook that reads or breaks a
/// reference between collections.
#[derive(Default)]
pub struct RelationLocks {
    by_tenant: Mutex<HashMap<TenantId, Arc<RwLock<()>>>>,
}

impl RelationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn for_tenant(&self, tenant: TenantId) -> Arc<RwLock<()>> {
        let mut map = self.by_tenant.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(tenant).or_default())
    }
}

/// Holds the caller's relation lock for the whole call.
///
/// Writes that check a reference take it shared; removals that cascade
/// take it exclusive. A reference checked under the shared lock therefore
/// still exists when the write commits.
pub struct HoldRelations {
    locks: Arc<RelationLocks>,
    exclusive: bool,
}

impl HoldRelations {
    pub fn shared(locks: Arc<RelationLocks>) -> Self {
        Self { locks, exclusive: false }
    }

    pub fn exclusive(locks: Arc<RelationLocks>) -> Self {
        Self { locks, exclusive: true }
    }
}

#[async_trait]
impl AroundHook<Value, CrmParams> for HoldRelations {
    async fn run(&self, ctx: &mut HookContext<Value, CrmParams>, next: Next<Value, CrmParams>) -> Result<()> {
        let lock = self.locks.for_tenant(ctx.tenant().tenant_id());
        if self.exclusive {
            let _guard = lock.write().await;
            next.run(ctx).await
        } else {
            let _guard = lock.read().await;
            next.run(ctx).await
        }
    }
}

/// `field` must name a record of `service` visible to the caller.
///
/// A missing or foreign record fails with the referenced service's own
/// not-found error, e.g. "Contact not found".
pub struct RequireReference {
    pub field: &'static str,
    pub service: &'static str,
}

#[async_trait]
impl BeforeHook<Value, CrmParams> for RequireReference {
    async fn run(&self, ctx: &mut HookContext<Value, CrmParams>) -> Result<()> {
        let Some(id) = ctx
            .data
            .as_ref()
            .and_then(|d| d.get(self.field))
            .and_then(Value::as_str)
        else {
            return Ok(());
        };

        let target = ctx.services.service(self.service)?;
        target.get(ctx.tenant(), id, ctx.params.clone()).await?;
        Ok(())
    }
}

/// Before a removal, removes every record of `service` whose `field`
/// points at the record being removed.
///
/// The parent is confirmed first, so an unknown or foreign id fails
/// without touching anything. Children go before the parent: a call cut
/// short leaves the parent in place and a retry finishes the job.
pub struct CascadeRemove {
    pub service: &'static str,
    pub field: &'static str,
}

#[async_trait]
impl BeforeHook<Value, CrmParams> for CascadeRemove {
    async fn run(&self, ctx: &mut HookContext<Value, CrmParams>) -> Result<()> {
        let Some(parent) = ctx.id.clone() else {
            return Ok(());
        };

        ctx.services
            .service(&ctx.service)?
            .get(ctx.tenant(), &parent, ctx.params.clone())
            .await?;

        let target = ctx.services.service(self.service)?;
        let mut params = ctx.params.clone();
        params.query = HashMap::from([
            (self.field.to_string(), parent),
            ("limit".to_string(), CASCADE_BATCH.to_string()),
        ]);

        let mut removed = 0usize;
        loop {
            let page = target.find(ctx.tenant(), params.clone()).await?;
            if page.is_empty() {
                break;
            }

            let mut progressed = false;
            for record in &page.data {
                let Some(id) = record.get("id").and_then(Value::as_str) else {
                    continue;
                };
                match target.remove(ctx.tenant(), id, params.clone()).await {
                    Ok(_) => {
                        removed += 1;
                        progressed = true;
                    }
                    // Already gone through a concurrent delete.
                    Err(e) if ScopeError::kind_of(&e) == ErrorKind::NotFound => {
                        progressed = true;
                    }
                    Err(e) => return Err(e),
                }
            }

            if !progressed {
                break;
            }
        }

        if removed > 0 {
            info!(
                from = %ctx.service,
                target = self.service,
                count = removed,
                "cascade removed dependent records"
            );
        } else {
            debug!(from = %ctx.service, target = self.service, "nothing to cascade");
        }
        Ok(())
    }
}

/// Attaches the record `field` points at, read through `service`, as
/// `into` on a single-record result.
pub struct EmbedReference {
    pub field: &'static str,
    pub service: &'static str,
    pub into: &'static str,
}

#[async_trait]
impl AfterHook<Value, CrmParams> for EmbedReference {
    async fn run(&self, ctx: &mut HookContext<Value, CrmParams>) -> Result<()> {
        let id = match &ctx.result {
            Some(HookResult::One(record)) => record.get(self.field).and_then(Value::as_str).map(str::to_string),
            _ => None,
        };
        let Some(id) = id else {
            return Ok(());
        };

        let target = ctx.services.service(self.service)?;
        let embedded = match target.get(ctx.tenant(), &id, ctx.params.clone()).await {
            Ok(v) => v,
            Err(e) if ScopeError::kind_of(&e) == ErrorKind::NotFound => Value::Null,
            Err(e) => return Err(e),
        };

        if let Some(HookResult::One(Value::Object(map))) = ctx.result.as_mut() {
            map.insert(self.into.to_string(), embedded);
        }
        Ok(())
    }
}
