// Principal directory.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tenantry_core::{PrincipalId, TenantId};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalRecord {
    pub id: PrincipalId,
    pub tenant_id: TenantId,
    pub is_active: bool,
}

/// Source of truth for which principals exist and where they belong.
///
/// When a resolver is given one, a token is only honoured if its
/// principal is listed, active, and registered under the token's tenant.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    async fn lookup(&self, id: PrincipalId) -> Result<Option<PrincipalRecord>>;
}

#[derive(Clone, Default)]
pub struct MemoryDirectory {
    records: Arc<RwLock<HashMap<PrincipalId, PrincipalRecord>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, record: PrincipalRecord) {
        self.records.write().await.insert(record.id, record);
    }

    pub async fn deactivate(&self, id: PrincipalId) -> bool {
        match self.records.write().await.get_mut(&id) {
            Some(r) => {
                r.is_active = false;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PrincipalDirectory for MemoryDirectory {
    async fn lookup(&self, id: PrincipalId) -> Result<Option<PrincipalRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }
}
