use std::sync::Arc;

use serde_json::Value;
use tenantry_core::{
    AppConfigSnapshot, EntityService, ScopedApp, ScopedService, TenantScope, TenantScoped,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};

pub mod contacts;
pub mod deals;
pub mod nullable;
pub mod properties;
pub mod relations;
pub mod viewings;

pub type CrmParams = tenantry_axum::RestParams;

pub type CrmService = Arc<dyn ScopedService<Value, CrmParams>>;

pub struct CrmServices {
    pub contacts: CrmService,
    pub deals: CrmService,
    pub properties: CrmService,
    pub viewings: CrmService,
}

fn entity_service<E>(config: &AppConfigSnapshot) -> CrmService
where
    E: TenantScoped + serde::Serialize,
    E::Create: serde::de::DeserializeOwned,
    E::Patch: serde::de::DeserializeOwned,
{
    let default = config.get_usize("paginate.default").unwrap_or(DEFAULT_PAGE_SIZE);
    let max = config.get_usize("paginate.max").unwrap_or(MAX_PAGE_SIZE);

    Arc::new(
        EntityService::<E, CrmParams>::new(TenantScope::in_memory()).with_page_limits(default, max),
    )
}

/// One in-memory collection per entity, shared by every tenant.
pub fn build(config: &AppConfigSnapshot) -> CrmServices {
    CrmServices {
        contacts: entity_service::<contacts::Contact>(config),
        deals: entity_service::<deals::Deal>(config),
        properties: entity_service::<properties::Property>(config),
        viewings: entity_service::<viewings::Viewing>(config),
    }
}

/// Per-service hooks. Services must already be registered.
pub fn register_hooks(app: &ScopedApp<Value, CrmParams>) -> anyhow::Result<()> {
    let locks = Arc::new(relations::RelationLocks::new());
    contacts::contacts_shared::register_hooks(app, &locks)?;
    deals::deals_shared::register_hooks(app, &locks)?;
    properties::properties_shared::register_hooks(app, &locks)?;
    viewings::viewings_shared::register_hooks(app, &locks)?;
    Ok(())
}
