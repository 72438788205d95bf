use std::sync::Arc;

use axum::handler::Handler;
use axum::routing::get;
use axum::Router;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tenantry_core::{PrincipalResolver, ScopedApp, ScopedService};
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::params::FromRestParams;
use crate::rest;
use crate::ScopedAxumState;

/// A [`ScopedApp`] served over HTTP.
///
/// Services are mounted at `<prefix>/<name>` and registered in the app
/// under `<name>`, which is what hooks use to call each other.
pub struct AxumApp<R, P = ()>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub app: ScopedApp<R, P>,
    pub router: Router<()>,
    resolver: Arc<dyn PrincipalResolver>,
    prefix: String,
}

impl<R, P> Clone for AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            app: self.app.clone(),
            router: self.router.clone(),
            resolver: Arc::clone(&self.resolver),
            prefix: self.prefix.clone(),
        }
    }
}

impl<R, P> AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub fn new(app: ScopedApp<R, P>, resolver: Arc<dyn PrincipalResolver>) -> Self {
        Self {
            app,
            router: Router::new(),
            resolver,
            prefix: String::new(),
        }
    }

    /// Path prefix for services mounted after this call, e.g. `/api/v1`.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.router = self.router.nest(path, router);
        self
    }

    pub fn use_get<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()> + Clone + Send + Sync + 'static,
        T: 'static,
    {
        let router = Router::new().route("/", get(handler));
        self.use_router(path, router)
    }

    /// Unauthenticated GET route outside any service, e.g. `/health`.
    pub fn service<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()> + Clone + Send + Sync + 'static,
        T: 'static,
    {
        self.use_get(path, handler)
    }

    pub fn use_service(mut self, name: &str, service: Arc<dyn ScopedService<R, P>>) -> Self
    where
        R: Serialize + DeserializeOwned,
        P: FromRestParams,
    {
        let name = name.trim_matches('/');
        self.app.register_service(name, service);

        let state = ScopedAxumState {
            app: self.app.clone(),
            resolver: Arc::clone(&self.resolver),
        };
        let router = rest::service_router(Arc::from(name), state);

        let path = format!("{}/{}", self.prefix, name);
        info!(service = name, path = %path, "service mounted");
        self.router = self.router.nest(&path, router);
        self
    }

    /// The finished router with request ids and HTTP tracing applied.
    pub fn into_router(self) -> Router<()> {
        self.router.fallback(rest::route_not_found).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = ?listener.local_addr()?, "listening");
        axum::serve(listener, self.into_router()).await?;
        Ok(())
    }
}

pub fn axum<R, P>(app: ScopedApp<R, P>, resolver: Arc<dyn PrincipalResolver>) -> AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    AxumApp::new(app, resolver)
}
