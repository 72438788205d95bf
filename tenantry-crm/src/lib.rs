//! tenantry-crm: multi-tenant CRM and real-estate API.
//!
//! Contacts, deals, properties and viewings are mounted under `/api/v1`.
//! Every route requires a bearer token whose `tenant_id` claim decides
//! which records the caller can see.

mod app;
mod hooks;
pub mod services;
pub mod validation;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tenantry_auth::{BearerResolver, PrincipalDirectory};
use tenantry_axum::{axum, AxumApp};
use tenantry_core::{load_config_from, ENV_PREFIX};
use tracing::debug;

pub use services::CrmParams;

pub const API_PREFIX: &str = "/api/v1";

/// Build from the process environment (`TENANTRY__*`).
pub fn build() -> Result<AxumApp<Value, CrmParams>> {
    build_with(std::env::vars(), None)
}

/// Build from explicit `TENANTRY__*` variables, optionally checking every
/// token's principal against `directory`.
pub fn build_with<I>(
    vars: I,
    directory: Option<Arc<dyn PrincipalDirectory>>,
) -> Result<AxumApp<Value, CrmParams>>
where
    I: IntoIterator<Item = (String, String)>,
{
    let app = app::crm_app();
    let loaded = load_config_from(&app, ENV_PREFIX, vars);
    debug!(loaded, "configuration loaded");

    let config = app.config_snapshot();
    let mut resolver = BearerResolver::from_config(&config).context("invalid auth configuration")?;
    if let Some(directory) = directory {
        resolver = resolver.with_directory(directory);
    }

    hooks::global_hooks(&app);
    let svcs = services::build(&config);

    let ax = axum(app, Arc::new(resolver))
        .with_prefix(API_PREFIX)
        .service("/health", || async { "ok" })
        .use_service("contacts", svcs.contacts)
        .use_service("deals", svcs.deals)
        .use_service("properties", svcs.properties)
        .use_service("viewings", svcs.viewings);

    services::register_hooks(&ax.app)?;

    Ok(ax)
}
