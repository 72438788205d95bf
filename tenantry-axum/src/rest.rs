use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    extract::{OriginalUri, Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    routing, Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tenantry_core::{Principal, ScopeError, ServiceHandle, TenantContext};
use tracing::debug;

use crate::{
    params::{header_map, FromRestParams, RestParams},
    ApiError, ScopedAxumState,
};

fn map_json_rejection(rejection: JsonRejection) -> ApiError {
    ScopeError::bad_request("Failed to parse the request body as JSON")
        .with_errors(json!({"_schema": [rejection.to_string()]}))
        .into()
}

/// Authenticates the caller and resolves the target service.
///
/// The tenant context comes from the verified principal only. Headers
/// such as `x-tenant-id` are handed to hooks as plain params and never
/// influence scoping.
async fn prepare<R, P>(
    state: &ScopedAxumState<R, P>,
    service: &str,
    headers: &HeaderMap,
    query: HashMap<String, String>,
    method: &str,
    uri: &Uri,
) -> Result<(ServiceHandle<R, P>, TenantContext, P), ApiError>
where
    R: Send + Sync + 'static,
    P: FromRestParams + Send + Sync + Clone + 'static,
{
    let principal = Principal::authenticate(state.resolver.as_ref(), &header_map(headers)).await?;
    let tenant = TenantContext::resolve(&principal);
    debug!(tenant = %tenant.tenant_id(), service, method, "rest call");

    let params = P::from_rest_params(RestParams::from_parts("rest", headers, query, method, uri));
    let svc = state.app.service(service)?;
    Ok((svc, tenant, params))
}

pub fn service_router<R, P>(service_name: Arc<str>, state: ScopedAxumState<R, P>) -> Router<()>
where
    R: Serialize + DeserializeOwned + Send + Sync + 'static,
    P: FromRestParams + Send + Sync + Clone + 'static,
{
    Router::new()
        .route(
            "/",
            routing::get({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<ScopedAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri| async move {
                    let (svc, tenant, params) =
                        prepare(&state, &service_name, &headers, query, "GET", &uri).await?;
                    let page = svc.find(&tenant, params).await?;
                    Ok::<_, ApiError>(Json(page))
                }
            })
            .post({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<ScopedAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      data: Result<Json<R>, JsonRejection>| async move {
                    let (svc, tenant, params) =
                        prepare(&state, &service_name, &headers, query, "POST", &uri).await?;
                    let Json(data) = data.map_err(map_json_rejection)?;

                    let res = svc.create(&tenant, data, params).await?;
                    Ok::<_, ApiError>((StatusCode::CREATED, Json(res)))
                }
            }),
        )
        .route(
            "/{id}",
            routing::get({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<ScopedAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>| async move {
                    let (svc, tenant, params) =
                        prepare(&state, &service_name, &headers, query, "GET", &uri).await?;
                    let res = svc.get(&tenant, &id, params).await?;
                    Ok::<_, ApiError>(Json(res))
                }
            })
            .put({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<ScopedAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>,
                      data: Result<Json<R>, JsonRejection>| async move {
                    let (svc, tenant, params) =
                        prepare(&state, &service_name, &headers, query, "PUT", &uri).await?;
                    let Json(data) = data.map_err(map_json_rejection)?;

                    let res = svc.update(&tenant, &id, data, params).await?;
                    Ok::<_, ApiError>(Json(res))
                }
            })
            .patch({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<ScopedAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>,
                      data: Result<Json<R>, JsonRejection>| async move {
                    let (svc, tenant, params) =
                        prepare(&state, &service_name, &headers, query, "PATCH", &uri).await?;
                    let Json(data) = data.map_err(map_json_rejection)?;

                    let res = svc.patch(&tenant, &id, data, params).await?;
                    Ok::<_, ApiError>(Json(res))
                }
            })
            .delete({
                let service_name = Arc::clone(&service_name);
                move |State(state): State<ScopedAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>| async move {
                    let (svc, tenant, params) =
                        prepare(&state, &service_name, &headers, query, "DELETE", &uri).await?;
                    svc.remove(&tenant, &id, params).await?;
                    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
                }
            }),
        )
        .with_state(state)
}

/// JSON 404 for paths no service is mounted on.
pub async fn route_not_found() -> ApiError {
    ScopeError::not_found("Not found").into()
}
