use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::errors::ScopeError;
use crate::page::Page;
use crate::tenant::TenantContext;

/// Standard service methods, Feathers style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceMethodKind {
    Find,
    Get,
    Create,
    Update,
    Patch,
    Remove,
}

impl ServiceMethodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceMethodKind::Find => "find",
            ServiceMethodKind::Get => "get",
            ServiceMethodKind::Create => "create",
            ServiceMethodKind::Update => "update",
            ServiceMethodKind::Patch => "patch",
            ServiceMethodKind::Remove => "remove",
        }
    }
}

/// Which methods a service exposes to transports.
#[derive(Debug, Clone)]
pub struct ServiceCapabilities {
    pub allowed_methods: Vec<ServiceMethodKind>,
}

impl ServiceCapabilities {
    pub fn standard_crud() -> Self {
        use ServiceMethodKind::*;
        Self {
            allowed_methods: vec![Find, Get, Create, Update, Patch, Remove],
        }
    }

    pub fn read_only() -> Self {
        use ServiceMethodKind::*;
        Self {
            allowed_methods: vec![Find, Get],
        }
    }

    pub fn from_methods(methods: Vec<ServiceMethodKind>) -> Self {
        Self {
            allowed_methods: methods,
        }
    }

    pub fn allows(&self, method: ServiceMethodKind) -> bool {
        self.allowed_methods.contains(&method)
    }
}

/// Params that can hand a service the caller's query string.
///
/// Filters and page tokens are read from here. Params never carry the
/// tenant; that always comes from the [`TenantContext`].
pub trait ListParams {
    fn query(&self) -> &HashMap<String, String>;
}

impl ListParams for HashMap<String, String> {
    fn query(&self) -> &HashMap<String, String> {
        self
    }
}

/// Tenant-scoped service, inspired by FeathersJS:
///
/// - `find`   → one page of the caller's records
/// - `get`    → one record by id
/// - `create` → new record owned by the caller's tenant
/// - `update` → full replace
/// - `patch`  → partial update
/// - `remove` → delete one
///
/// Every method receives the resolved [`TenantContext`]. Methods a
/// service does not support answer `NotImplemented`.
#[async_trait]
pub trait ScopedService<R, P = ()>: Send + Sync
where
    R: Send + 'static,
    P: Send + 'static,
{
    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities::standard_crud()
    }

    async fn find(&self, _ctx: &TenantContext, _params: P) -> Result<Page<R>> {
        Err(ScopeError::not_implemented("Method not implemented: find").into_anyhow())
    }

    async fn get(&self, _ctx: &TenantContext, _id: &str, _params: P) -> Result<R> {
        Err(ScopeError::not_implemented("Method not implemented: get").into_anyhow())
    }

    async fn create(&self, _ctx: &TenantContext, _data: R, _params: P) -> Result<R> {
        Err(ScopeError::not_implemented("Method not implemented: create").into_anyhow())
    }

    async fn update(&self, _ctx: &TenantContext, _id: &str, _data: R, _params: P) -> Result<R> {
        Err(ScopeError::not_implemented("Method not implemented: update").into_anyhow())
    }

    async fn patch(&self, _ctx: &TenantContext, _id: &str, _data: R, _params: P) -> Result<R> {
        Err(ScopeError::not_implemented("Method not implemented: patch").into_anyhow())
    }

    async fn remove(&self, _ctx: &TenantContext, _id: &str, _params: P) -> Result<R> {
        Err(ScopeError::not_implemented("Method not implemented: remove").into_anyhow())
    }
}
