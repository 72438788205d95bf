//! tenantry-axum: Axum adapter for tenant-scoped services.
//!
//! Every REST call is authenticated before it reaches a service. The
//! tenant of the call is taken from the verified principal and nothing
//! else in the request.

pub mod app;
pub mod params;
pub mod rest;
pub mod state;
mod error;

pub use app::{axum, AxumApp};
pub use error::ApiError;
pub use params::{FromRestParams, RestParams};
pub use state::ScopedAxumState;
