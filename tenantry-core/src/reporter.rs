//! The one place that turns "absent or not yours" into an error.
//!
//! A record that does not exist and a record owned by another tenant must
//! be indistinguishable to the caller: same kind, same status, same
//! message, same shape. Nothing else in the crate builds this error.

use tracing::warn;

use crate::entity::TenantScoped;
use crate::errors::{ScopeError, ScopeResult};
use crate::tenant::TenantContext;

pub struct Reporter;

impl Reporter {
    /// `NotFound` with the message `"<Noun> not found"`.
    pub fn not_found<E: TenantScoped>() -> anyhow::Error {
        ScopeError::not_found(format!("{} not found", E::NOUN)).into_anyhow()
    }

    /// Keep `record` only if it belongs to the context's tenant.
    ///
    /// A foreign record is logged server-side and then treated exactly
    /// like an absent one.
    pub fn owned<E: TenantScoped>(ctx: &TenantContext, record: Option<E>) -> Option<E> {
        match record {
            Some(r) if r.tenant_id() == ctx.tenant_id() => Some(r),
            Some(r) => {
                warn!(
                    tenant = %ctx.tenant_id(),
                    principal = %ctx.principal_id(),
                    collection = E::COLLECTION,
                    record = %r.id(),
                    "cross-tenant access attempt"
                );
                None
            }
            None => None,
        }
    }

    /// Owned record or the uniform not-found error.
    pub fn require<E: TenantScoped>(ctx: &TenantContext, record: Option<E>) -> ScopeResult<E> {
        Self::owned(ctx, record).ok_or_else(Self::not_found::<E>)
    }
}
