use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::app::ServiceCaller;
use crate::config::AppConfigSnapshot;
use crate::page::Page;
use crate::service::ServiceMethodKind;
use crate::tenant::TenantContext;

pub type HookFut<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// What a service call produced.
#[derive(Debug, Clone)]
pub enum HookResult<R> {
    One(R),
    Page(Page<R>),
}

/// Everything a hook can see about the current call.
///
/// The tenant context is read-only here. The service method always runs
/// under the context the call was started with.
pub struct HookContext<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    tenant: TenantContext,
    pub service: String,
    pub method: ServiceMethodKind,
    pub params: P,
    pub id: Option<String>,
    pub data: Option<R>,
    pub result: Option<HookResult<R>>,
    pub error: Option<anyhow::Error>,
    pub services: ServiceCaller<R, P>,
    pub config: AppConfigSnapshot,
}

impl<R, P> HookContext<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new(
        tenant: TenantContext,
        service: impl Into<String>,
        method: ServiceMethodKind,
        params: P,
        services: ServiceCaller<R, P>,
        config: AppConfigSnapshot,
    ) -> Self {
        Self {
            tenant,
            service: service.into(),
            method,
            params,
            id: None,
            data: None,
            result: None,
            error: None,
            services,
            config,
        }
    }

    pub fn tenant(&self) -> &TenantContext {
        &self.tenant
    }
}

/// The rest of the pipeline, handed to around hooks.
pub struct Next<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    call: Box<dyn for<'a> FnOnce(&'a mut HookContext<R, P>) -> HookFut<'a> + Send>,
}

impl<R, P> Next<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new<F>(call: F) -> Self
    where
        F: for<'a> FnOnce(&'a mut HookContext<R, P>) -> HookFut<'a> + Send + 'static,
    {
        Self {
            call: Box::new(call),
        }
    }

    pub async fn run(self, ctx: &mut HookContext<R, P>) -> Result<()> {
        (self.call)(ctx).await
    }
}

#[async_trait]
pub trait BeforeHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

#[async_trait]
pub trait AfterHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

/// Runs with `ctx.error` set. Clearing it (and setting `ctx.result`)
/// recovers the call.
#[async_trait]
pub trait ErrorHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

#[async_trait]
pub trait AroundHook<R, P>: Send + Sync
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    async fn run(&self, ctx: &mut HookContext<R, P>, next: Next<R, P>) -> Result<()>;
}

type ByMethod<T> = HashMap<ServiceMethodKind, Vec<Arc<T>>>;

/// Hook registrations for the whole app or a single service.
pub struct ServiceHooks<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub around_all: Vec<Arc<dyn AroundHook<R, P>>>,
    pub before_all: Vec<Arc<dyn BeforeHook<R, P>>>,
    pub after_all: Vec<Arc<dyn AfterHook<R, P>>>,
    pub error_all: Vec<Arc<dyn ErrorHook<R, P>>>,

    pub around_by_method: ByMethod<dyn AroundHook<R, P>>,
    pub before_by_method: ByMethod<dyn BeforeHook<R, P>>,
    pub after_by_method: ByMethod<dyn AfterHook<R, P>>,
    pub error_by_method: ByMethod<dyn ErrorHook<R, P>>,
}

impl<R, P> Default for ServiceHooks<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, P> ServiceHooks<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            around_all: Vec::new(),
            before_all: Vec::new(),
            after_all: Vec::new(),
            error_all: Vec::new(),
            around_by_method: HashMap::new(),
            before_by_method: HashMap::new(),
            after_by_method: HashMap::new(),
            error_by_method: HashMap::new(),
        }
    }

    pub fn around_all(&mut self, hook: Arc<dyn AroundHook<R, P>>) -> &mut Self {
        self.around_all.push(hook);
        self
    }

    pub fn before_all(&mut self, hook: Arc<dyn BeforeHook<R, P>>) -> &mut Self {
        self.before_all.push(hook);
        self
    }

    pub fn after_all(&mut self, hook: Arc<dyn AfterHook<R, P>>) -> &mut Self {
        self.after_all.push(hook);
        self
    }

    pub fn error_all(&mut self, hook: Arc<dyn ErrorHook<R, P>>) -> &mut Self {
        self.error_all.push(hook);
        self
    }

    pub fn around(&mut self, method: ServiceMethodKind, hook: Arc<dyn AroundHook<R, P>>) -> &mut Self {
        self.around_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn before(&mut self, method: ServiceMethodKind, hook: Arc<dyn BeforeHook<R, P>>) -> &mut Self {
        self.before_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn after(&mut self, method: ServiceMethodKind, hook: Arc<dyn AfterHook<R, P>>) -> &mut Self {
        self.after_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn error(&mut self, method: ServiceMethodKind, hook: Arc<dyn ErrorHook<R, P>>) -> &mut Self {
        self.error_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn before_create(&mut self, hook: Arc<dyn BeforeHook<R, P>>) -> &mut Self {
        self.before(ServiceMethodKind::Create, hook)
    }

    pub fn before_update(&mut self, hook: Arc<dyn BeforeHook<R, P>>) -> &mut Self {
        self.before(ServiceMethodKind::Update, hook)
    }

    pub fn before_patch(&mut self, hook: Arc<dyn BeforeHook<R, P>>) -> &mut Self {
        self.before(ServiceMethodKind::Patch, hook)
    }

    pub fn before_remove(&mut self, hook: Arc<dyn BeforeHook<R, P>>) -> &mut Self {
        self.before(ServiceMethodKind::Remove, hook)
    }

    pub fn after_find(&mut self, hook: Arc<dyn AfterHook<R, P>>) -> &mut Self {
        self.after(ServiceMethodKind::Find, hook)
    }

    pub fn after_remove(&mut self, hook: Arc<dyn AfterHook<R, P>>) -> &mut Self {
        self.after(ServiceMethodKind::Remove, hook)
    }
}

/// `all` hooks first, then those registered for `method`.
pub(crate) fn collect_method_hooks<T: ?Sized>(
    all: &[Arc<T>],
    by_method: &ByMethod<T>,
    method: ServiceMethodKind,
) -> Vec<Arc<T>> {
    let mut out: Vec<Arc<T>> = all.to_vec();
    if let Some(v) = by_method.get(&method) {
        out.extend(v.iter().cloned());
    }
    out
}
