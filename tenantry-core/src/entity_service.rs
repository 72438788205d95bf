//! JSON service over a [`TenantScope`].
//!
//! Transports speak `serde_json::Value`; this adapter decodes payloads
//! into an entity's `Create` / `Patch` types and funnels every call
//! through the enforcement layer.

use std::marker::PhantomData;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::entity::{RecordId, TenantScoped};
use crate::errors::{ScopeError, ScopeResult};
use crate::page::{Page, PageRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::reporter::Reporter;
use crate::scope::TenantScope;
use crate::service::{ListParams, ScopedService, ServiceCapabilities};
use crate::tenant::TenantContext;

/// Keys a client may never set.
const SERVER_OWNED_KEYS: &[&str] = &["id", "tenant_id", "tenantId", "created_at", "updated_at"];

pub struct EntityService<E: TenantScoped, P = ()> {
    scope: TenantScope<E>,
    default_limit: usize,
    max_limit: usize,
    capabilities: ServiceCapabilities,
    _params: PhantomData<fn(P)>,
}

impl<E: TenantScoped, P> EntityService<E, P> {
    pub fn new(scope: TenantScope<E>) -> Self {
        Self {
            scope,
            default_limit: DEFAULT_PAGE_SIZE,
            max_limit: MAX_PAGE_SIZE,
            capabilities: ServiceCapabilities::standard_crud(),
            _params: PhantomData,
        }
    }

    pub fn with_page_limits(mut self, default: usize, max: usize) -> Self {
        self.max_limit = max.max(1);
        self.default_limit = default.clamp(1, self.max_limit);
        self
    }

    pub fn with_capabilities(mut self, capabilities: ServiceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// Drop server-owned keys from a client payload.
pub fn strip_server_owned(ctx: &TenantContext, collection: &str, data: &mut Map<String, Value>) {
    for key in SERVER_OWNED_KEYS {
        if data.remove(*key).is_some() && key.starts_with("tenant") {
            warn!(
                tenant = %ctx.tenant_id(),
                principal = %ctx.principal_id(),
                collection,
                "client-supplied tenant_id ignored"
            );
        }
    }
}

fn decode<E: TenantScoped, T: DeserializeOwned>(ctx: &TenantContext, data: Value) -> ScopeResult<T> {
    let Value::Object(mut map) = data else {
        return Err(ScopeError::unprocessable(format!("{} payload must be a JSON object", E::NOUN))
            .into_anyhow());
    };
    strip_server_owned(ctx, E::COLLECTION, &mut map);

    serde_json::from_value(Value::Object(map)).map_err(|e| {
        ScopeError::unprocessable(format!("Invalid {} payload", E::NOUN))
            .with_errors(json!({ "body": [e.to_string()] }))
            .into_anyhow()
    })
}

fn encode<E: TenantScoped + Serialize>(record: &E) -> ScopeResult<Value> {
    serde_json::to_value(record).map_err(|e| {
        ScopeError::general_error(format!("Failed to encode {}", E::NOUN))
            .with_source(e.into())
            .into_anyhow()
    })
}

fn parse_id<E: TenantScoped>(id: &str) -> ScopeResult<RecordId> {
    RecordId::parse(id).ok_or_else(Reporter::not_found::<E>)
}

#[async_trait]
impl<E, P> ScopedService<Value, P> for EntityService<E, P>
where
    E: TenantScoped + Serialize,
    E::Create: DeserializeOwned,
    E::Patch: DeserializeOwned,
    P: ListParams + Send + 'static,
{
    fn capabilities(&self) -> ServiceCapabilities {
        self.capabilities.clone()
    }

    async fn find(&self, ctx: &TenantContext, params: P) -> Result<Page<Value>> {
        let query = params.query();
        let request = PageRequest::from_query(query, self.default_limit, self.max_limit)?;
        let filter = E::filter_from_query(query)?;

        let page = self.scope.list(ctx, filter, &request).await?;
        page.try_map(|r| encode(&r))
    }

    async fn get(&self, ctx: &TenantContext, id: &str, _params: P) -> Result<Value> {
        let record = self.scope.get(ctx, parse_id::<E>(id)?).await?;
        encode(&record)
    }

    async fn create(&self, ctx: &TenantContext, data: Value, _params: P) -> Result<Value> {
        let payload: E::Create = decode::<E, _>(ctx, data)?;
        let record = self.scope.create(ctx, payload).await?;
        encode(&record)
    }

    async fn update(&self, ctx: &TenantContext, id: &str, data: Value, _params: P) -> Result<Value> {
        let id = parse_id::<E>(id)?;
        let payload: E::Create = decode::<E, _>(ctx, data)?;
        let record = self.scope.replace(ctx, id, payload).await?;
        encode(&record)
    }

    async fn patch(&self, ctx: &TenantContext, id: &str, data: Value, _params: P) -> Result<Value> {
        let id = parse_id::<E>(id)?;
        let patch: E::Patch = decode::<E, _>(ctx, data)?;
        let record = self.scope.update(ctx, id, patch).await?;
        encode(&record)
    }

    async fn remove(&self, ctx: &TenantContext, id: &str, _params: P) -> Result<Value> {
        let record = self.scope.delete(ctx, parse_id::<E>(id)?).await?;
        encode(&record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::testing::{ctx, tenant, Note};
    use std::collections::HashMap;

    type Query = HashMap<String, String>;

    fn service() -> EntityService<Note, Query> {
        EntityService::new(TenantScope::in_memory()).with_page_limits(2, 5)
    }

    #[tokio::test]
    async fn client_tenant_id_is_ignored_on_create_and_patch() {
        let svc = service();
        let a = ctx(tenant());
        let other = tenant();

        let created = svc
            .create(&a, json!({"title": "t", "score": 1.0, "tenant_id": other, "id": "x"}), Query::new())
            .await
            .unwrap();
        assert_eq!(created["tenant_id"], json!(a.tenant_id()));

        let id = created["id"].as_str().unwrap().to_string();
        let patched = svc
            .patch(&a, &id, json!({"tenantId": other, "title": "u"}), Query::new())
            .await
            .unwrap();
        assert_eq!(patched["tenant_id"], json!(a.tenant_id()));
        assert_eq!(patched["title"], "u");
    }

    #[tokio::test]
    async fn unparsable_id_reads_as_not_found() {
        let err = service().get(&ctx(tenant()), "nope", Query::new()).await.unwrap_err();
        let scope = ScopeError::from_anyhow(&err).unwrap();
        assert_eq!(scope.kind, ErrorKind::NotFound);
        assert_eq!(scope.message, "Note not found");
    }

    #[tokio::test]
    async fn bad_payload_is_unprocessable() {
        let err = service()
            .create(&ctx(tenant()), json!({"title": 3}), Query::new())
            .await
            .unwrap_err();
        assert_eq!(ScopeError::kind_of(&err), ErrorKind::Unprocessable);

        let err = service()
            .create(&ctx(tenant()), json!([1, 2]), Query::new())
            .await
            .unwrap_err();
        assert_eq!(ScopeError::kind_of(&err), ErrorKind::Unprocessable);
    }

    #[tokio::test]
    async fn find_applies_query_filter_and_page_limits() {
        let svc = service();
        let a = ctx(tenant());
        for title in ["alpha", "alps", "beta", "alto"] {
            svc.create(&a, json!({"title": title, "score": 0.0}), Query::new())
                .await
                .unwrap();
        }

        let mut q = Query::new();
        q.insert("search".into(), "AL".into());
        let page = svc.find(&a, q.clone()).await.unwrap();
        assert_eq!(page.limit, 2);
        assert_eq!(page.len(), 2);
        let token = page.next_page_token.clone().unwrap();

        q.insert("pageToken".into(), token);
        let rest = svc.find(&a, q).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert!(rest.next_page_token.is_none());

        let mut q = Query::new();
        q.insert("pageToken".into(), "garbage!".into());
        let err = svc.find(&a, q).await.unwrap_err();
        assert_eq!(ScopeError::kind_of(&err), ErrorKind::BadRequest);
    }
}
