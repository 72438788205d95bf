//! tenantry-core: framework-agnostic tenant isolation for Tenantry.
//!
//! Services never reach storage directly. Every read and write goes
//! through a [`TenantScope`], which takes the resolved [`TenantContext`]
//! of the current call and confines the operation to that tenant.

pub mod app;
pub mod config;
pub mod entity;
pub mod entity_service;
pub mod errors;
pub mod hooks;
pub mod page;
pub mod predicate;
pub mod registry;
pub mod reporter;
pub mod scope;
pub mod service;
pub mod store;
pub mod tenant;

#[cfg(test)]
mod testing;

pub use app::{ScopedApp, ServiceCaller, ServiceHandle};
pub use config::{load_config_from, load_env_config, AppConfig, AppConfigSnapshot, ENV_PREFIX};
pub use entity::{FieldValue, RecordId, TenantScoped};
pub use entity_service::EntityService;
pub use errors::{ErrorKind, ScopeError, ScopeResult};
pub use hooks::{
    AfterHook, AroundHook, BeforeHook, ErrorHook, HookContext, HookResult, Next, ServiceHooks,
};
pub use page::{Cursor, Page, PageRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use predicate::{Predicate, ScopedPredicate};
pub use registry::ServiceRegistry;
pub use reporter::Reporter;
pub use scope::TenantScope;
pub use service::{ListParams, ScopedService, ServiceCapabilities, ServiceMethodKind};
pub use store::{MemoryStore, RecordStore, StoreError, StoreTx};
pub use tenant::{Identity, Principal, PrincipalId, PrincipalResolver, TenantContext, TenantId};
