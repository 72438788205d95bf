use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use tracing::{info_span, warn, Instrument};

use crate::config::{AppConfig, AppConfigSnapshot};
use crate::errors::ScopeError;
use crate::hooks::{
    collect_method_hooks, AfterHook, AroundHook, BeforeHook, ErrorHook, HookContext, HookFut,
    HookResult, Next, ServiceHooks,
};
use crate::page::Page;
use crate::registry::ServiceRegistry;
use crate::service::{ScopedService, ServiceCapabilities, ServiceMethodKind};
use crate::tenant::TenantContext;

struct AppInner<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    registry: RwLock<ServiceRegistry<R, P>>,
    global_hooks: RwLock<ServiceHooks<R, P>>,
    service_hooks: RwLock<HashMap<String, ServiceHooks<R, P>>>,
    config: RwLock<AppConfig>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Central application container.
///
/// Framework-agnostic. Holds:
/// - service registry
/// - app hooks
/// - per-service hooks
/// - config
pub struct ScopedApp<R, P = ()>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    inner: Arc<AppInner<R, P>>,
}

type HooksForMethod<R, P> = (
    Vec<Arc<dyn AroundHook<R, P>>>,
    Vec<Arc<dyn BeforeHook<R, P>>>,
    Vec<Arc<dyn AfterHook<R, P>>>,
    Vec<Arc<dyn ErrorHook<R, P>>>,
);

impl<R, P> Default for ScopedApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, P> Clone for ScopedApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, P> ScopedApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AppInner {
                registry: RwLock::new(ServiceRegistry::new()),
                global_hooks: RwLock::new(ServiceHooks::new()),
                service_hooks: RwLock::new(HashMap::new()),
                config: RwLock::new(AppConfig::new()),
            }),
        }
    }

    pub fn register_service<S>(&self, name: S, service: Arc<dyn ScopedService<R, P>>)
    where
        S: Into<String>,
    {
        write(&self.inner.registry).register(name, service);
    }

    /// Feathers: `app.hooks({ ... })`
    pub fn hooks<F>(&self, f: F)
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        let mut g = write(&self.inner.global_hooks);
        f(&mut g);
    }

    pub(crate) fn configure_service_hooks<F>(&self, service_name: &str, f: F)
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        let mut map = write(&self.inner.service_hooks);
        f(map.entry(service_name.to_string()).or_default());
    }

    /// Feathers: `app.service("name")`
    pub fn service(&self, name: &str) -> Result<ServiceHandle<R, P>> {
        let svc = read(&self.inner.registry)
            .get(name)
            .cloned()
            .ok_or_else(|| ScopeError::not_found(format!("Service not found: {name}")).into_anyhow())?;

        Ok(ServiceHandle {
            app: self.clone(),
            name: name.to_string(),
            service: svc,
        })
    }

    /// Feathers: `app.set(key, value)`
    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        write(&self.inner.config).set(key, value);
    }

    /// Feathers: `app.get(key)`
    pub fn get(&self, key: &str) -> Option<String> {
        read(&self.inner.config).get(key).map(|v| v.to_string())
    }

    pub fn config_snapshot(&self) -> AppConfigSnapshot {
        read(&self.inner.config).snapshot()
    }
}

pub struct ServiceHandle<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    app: ScopedApp<R, P>,
    name: String,
    service: Arc<dyn ScopedService<R, P>>,
}

impl<R, P> Clone for ServiceHandle<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            app: self.app.clone(),
            name: self.name.clone(),
            service: Arc::clone(&self.service),
        }
    }
}

impl<R, P> ServiceHandle<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn hooks<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        self.app.configure_service_hooks(&self.name, f);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> ServiceCapabilities {
        self.service.capabilities()
    }

    /// Global hooks first, then the service's own.
    fn collect_hooks_for_method(&self, method: ServiceMethodKind) -> HooksForMethod<R, P> {
        let g = read(&self.app.inner.global_hooks);
        let map = read(&self.app.inner.service_hooks);

        let mut around = collect_method_hooks(&g.around_all, &g.around_by_method, method);
        let mut before = collect_method_hooks(&g.before_all, &g.before_by_method, method);
        let mut after = collect_method_hooks(&g.after_all, &g.after_by_method, method);
        let mut error = collect_method_hooks(&g.error_all, &g.error_by_method, method);

        if let Some(h) = map.get(&self.name) {
            around.extend(collect_method_hooks(&h.around_all, &h.around_by_method, method));
            before.extend(collect_method_hooks(&h.before_all, &h.before_by_method, method));
            after.extend(collect_method_hooks(&h.after_all, &h.after_by_method, method));
            error.extend(collect_method_hooks(&h.error_all, &h.error_by_method, method));
        }

        (around, before, after, error)
    }

    fn context(&self, tenant: &TenantContext, method: ServiceMethodKind, params: P) -> HookContext<R, P> {
        HookContext::new(
            tenant.clone(),
            self.name.clone(),
            method,
            params,
            ServiceCaller::new(self.app.clone()),
            self.app.config_snapshot(),
        )
    }

    /// around → before → service → after, then error hooks on failure.
    ///
    /// After hooks unwind: the service's own run before the global ones.
    async fn run_pipeline(&self, mut ctx: HookContext<R, P>) -> Result<HookContext<R, P>> {
        let method = ctx.method;
        if !self.service.capabilities().allows(method) {
            return Err(ScopeError::method_not_allowed(format!(
                "Method '{}' is not allowed on service '{}'",
                method.as_str(),
                self.name
            ))
            .into_anyhow());
        }

        let (around, before, after, error) = self.collect_hooks_for_method(method);
        let svc = Arc::clone(&self.service);
        let tenant = ctx.tenant().clone();

        let mut next: Next<R, P> = Next::new(move |ctx| {
            let fut: HookFut<'_> = Box::pin(async move {
                for h in &before {
                    h.run(ctx).await?;
                }

                dispatch(svc, &tenant, ctx).await?;

                for h in after.iter().rev() {
                    h.run(ctx).await?;
                }
                Ok(())
            });
            fut
        });

        // First registered around hook is outermost.
        for h in around.iter().rev() {
            let hook = Arc::clone(h);
            let prev = next;
            next = Next::new(move |ctx| {
                let fut: HookFut<'_> = Box::pin(async move { hook.run(ctx, prev).await });
                fut
            });
        }

        let span = info_span!(
            "service",
            tenant = %ctx.tenant().tenant_id(),
            principal = %ctx.tenant().principal_id(),
            service = %self.name,
            method = method.as_str(),
        );

        async move {
            if let Err(e) = next.run(&mut ctx).await {
                ctx.error = Some(e);

                for h in &error {
                    if let Err(hook_err) = h.run(&mut ctx).await {
                        warn!(error = %hook_err, "error hook failed");
                    }
                }

                if let Some(err) = ctx.error.take() {
                    return Err(err);
                }
            }
            Ok(ctx)
        }
        .instrument(span)
        .await
    }

    pub async fn find(&self, tenant: &TenantContext, params: P) -> Result<Page<R>> {
        let ctx = self.context(tenant, ServiceMethodKind::Find, params);
        let ctx = self.run_pipeline(ctx).await?;

        match ctx.result {
            Some(HookResult::Page(page)) => Ok(page),
            _ => Err(no_result(ServiceMethodKind::Find)),
        }
    }

    pub async fn get(&self, tenant: &TenantContext, id: &str, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Get, params);
        ctx.id = Some(id.to_string());
        take_one(self.run_pipeline(ctx).await?)
    }

    pub async fn create(&self, tenant: &TenantContext, data: R, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Create, params);
        ctx.data = Some(data);
        take_one(self.run_pipeline(ctx).await?)
    }

    pub async fn update(&self, tenant: &TenantContext, id: &str, data: R, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Update, params);
        ctx.id = Some(id.to_string());
        ctx.data = Some(data);
        take_one(self.run_pipeline(ctx).await?)
    }

    pub async fn patch(&self, tenant: &TenantContext, id: &str, data: R, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Patch, params);
        ctx.id = Some(id.to_string());
        ctx.data = Some(data);
        take_one(self.run_pipeline(ctx).await?)
    }

    pub async fn remove(&self, tenant: &TenantContext, id: &str, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Remove, params);
        ctx.id = Some(id.to_string());
        take_one(self.run_pipeline(ctx).await?)
    }
}

fn no_result(method: ServiceMethodKind) -> anyhow::Error {
    ScopeError::general_error(format!("{}() produced no result", method.as_str())).into_anyhow()
}

fn take_one<R, P>(ctx: HookContext<R, P>) -> Result<R>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    match ctx.result {
        Some(HookResult::One(v)) => Ok(v),
        _ => Err(no_result(ctx.method)),
    }
}

/// Call the service method named by `ctx.method` under `tenant` and
/// store its result.
fn dispatch<'a, R, P>(
    svc: Arc<dyn ScopedService<R, P>>,
    tenant: &'a TenantContext,
    ctx: &'a mut HookContext<R, P>,
) -> HookFut<'a>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    Box::pin(async move {
        let params = ctx.params.clone();
        let id = ctx.id.clone().unwrap_or_default();
        let method = ctx.method;
        let missing_data =
            || ScopeError::unprocessable(format!("{}() requires data", method.as_str())).into_anyhow();

        let result = match method {
            ServiceMethodKind::Find => HookResult::Page(svc.find(tenant, params).await?),
            ServiceMethodKind::Get => HookResult::One(svc.get(tenant, &id, params).await?),
            ServiceMethodKind::Create => {
                let data = ctx.data.take().ok_or_else(missing_data)?;
                HookResult::One(svc.create(tenant, data, params).await?)
            }
            ServiceMethodKind::Update => {
                let data = ctx.data.take().ok_or_else(missing_data)?;
                HookResult::One(svc.update(tenant, &id, data, params).await?)
            }
            ServiceMethodKind::Patch => {
                let data = ctx.data.take().ok_or_else(missing_data)?;
                HookResult::One(svc.patch(tenant, &id, data, params).await?)
            }
            ServiceMethodKind::Remove => HookResult::One(svc.remove(tenant, &id, params).await?),
        };

        ctx.result = Some(result);
        Ok(())
    })
}

/// Lets hooks call other services with the same tenant context.
pub struct ServiceCaller<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    app: ScopedApp<R, P>,
}

impl<R, P> Clone for ServiceCaller<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            app: self.app.clone(),
        }
    }
}

impl<R, P> ServiceCaller<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new(app: ScopedApp<R, P>) -> Self {
        Self { app }
    }

    pub fn service(&self, name: &str) -> Result<ServiceHandle<R, P>> {
        self.app.service(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_service::EntityService;
    use crate::errors::ErrorKind;
    use crate::scope::TenantScope;
    use crate::testing::{ctx, tenant, Note};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    type Query = HashMap<String, String>;
    type App = ScopedApp<Value, Query>;

    struct Record {
        log: Arc<Mutex<Vec<String>>>,
        label: &'static str,
    }

    impl Record {
        fn push(&self, what: &str) {
            self.log.lock().unwrap().push(format!("{}:{what}", self.label));
        }
    }

    #[async_trait]
    impl BeforeHook<Value, Query> for Record {
        async fn run(&self, _ctx: &mut HookContext<Value, Query>) -> Result<()> {
            self.push("before");
            Ok(())
        }
    }

    #[async_trait]
    impl AfterHook<Value, Query> for Record {
        async fn run(&self, _ctx: &mut HookContext<Value, Query>) -> Result<()> {
            self.push("after");
            Ok(())
        }
    }

    #[async_trait]
    impl AroundHook<Value, Query> for Record {
        async fn run(&self, ctx: &mut HookContext<Value, Query>, next: Next<Value, Query>) -> Result<()> {
            self.push("enter");
            next.run(ctx).await?;
            self.push("leave");
            Ok(())
        }
    }

    struct Recover;

    #[async_trait]
    impl ErrorHook<Value, Query> for Recover {
        async fn run(&self, ctx: &mut HookContext<Value, Query>) -> Result<()> {
            if ctx.error.as_ref().map(ScopeError::kind_of) == Some(ErrorKind::NotFound) {
                ctx.error = None;
                ctx.result = Some(HookResult::One(json!(null)));
            }
            Ok(())
        }
    }

    /// Replaces the whole hook context with one bound to `other`.
    struct SwapContext {
        other: TenantContext,
    }

    #[async_trait]
    impl BeforeHook<Value, Query> for SwapContext {
        async fn run(&self, ctx: &mut HookContext<Value, Query>) -> Result<()> {
            let mut swapped = HookContext::new(
                self.other.clone(),
                ctx.service.clone(),
                ctx.method,
                ctx.params.clone(),
                ctx.services.clone(),
                ctx.config.clone(),
            );
            swapped.id = ctx.id.clone();
            swapped.data = ctx.data.take();
            *ctx = swapped;
            Ok(())
        }
    }

    fn app() -> App {
        let app = App::new();
        app.register_service(
            "notes",
            Arc::new(EntityService::<Note, Query>::new(TenantScope::in_memory())),
        );
        app
    }

    #[tokio::test]
    async fn hooks_run_global_first_and_after_hooks_unwind() {
        let app = app();
        let log = Arc::new(Mutex::new(Vec::new()));
        let g = Arc::new(Record { log: log.clone(), label: "g" });
        let s = Arc::new(Record { log: log.clone(), label: "s" });

        app.hooks(|h| {
            h.around_all(g.clone()).before_all(g.clone()).after_all(g.clone());
        });
        app.service("notes").unwrap().hooks(|h| {
            h.around_all(s.clone()).before_all(s.clone()).after_all(s.clone());
        });

        app.service("notes")
            .unwrap()
            .create(&ctx(tenant()), json!({"title": "a", "score": 1.0}), Query::new())
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "g:enter", "s:enter", "g:before", "s:before", "s:after", "g:after", "s:leave",
                "g:leave"
            ]
        );
    }

    #[tokio::test]
    async fn hooks_cannot_move_a_call_to_another_tenant() {
        let app = app();
        let owner = ctx(tenant());
        let intruder = ctx(tenant());

        let created = app
            .service("notes")
            .unwrap()
            .create(&owner, json!({"title": "a", "score": 1.0}), Query::new())
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        let notes = app.service("notes").unwrap().hooks(|h| {
            h.before_all(Arc::new(SwapContext { other: owner.clone() }));
        });

        let err = notes.get(&intruder, &id, Query::new()).await.unwrap_err();
        assert_eq!(ScopeError::kind_of(&err), ErrorKind::NotFound);

        let mine = notes
            .create(&intruder, json!({"title": "b", "score": 2.0}), Query::new())
            .await
            .unwrap();
        assert_eq!(mine["tenant_id"], json!(intruder.tenant_id()));

        let page = notes.find(&intruder, Query::new()).await.unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0]["title"], "b");
    }

    #[tokio::test]
    async fn error_hooks_can_recover() {
        let app = app();
        let notes = app.service("notes").unwrap().hooks(|h| {
            h.error(ServiceMethodKind::Get, Arc::new(Recover));
        });

        let got = notes.get(&ctx(tenant()), "missing", Query::new()).await.unwrap();
        assert_eq!(got, json!(null));

        let err = notes
            .patch(&ctx(tenant()), "missing", json!({}), Query::new())
            .await
            .unwrap_err();
        assert_eq!(ScopeError::kind_of(&err), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn capabilities_gate_methods() {
        let app = App::new();
        app.register_service(
            "notes",
            Arc::new(
                EntityService::<Note, Query>::new(TenantScope::in_memory())
                    .with_capabilities(ServiceCapabilities::read_only()),
            ),
        );

        let err = app
            .service("notes")
            .unwrap()
            .create(&ctx(tenant()), json!({"title": "a", "score": 1.0}), Query::new())
            .await
            .unwrap_err();
        assert_eq!(ScopeError::kind_of(&err), ErrorKind::MethodNotAllowed);
    }

    #[tokio::test]
    async fn unknown_service_is_not_found() {
        let err = app().service("nope").err().unwrap();
        assert_eq!(ScopeError::kind_of(&err), ErrorKind::NotFound);
    }
}
