//! tenantry-auth: turns bearer credentials into a verified principal.
//!
//! Token issuance and credential storage live elsewhere; this crate only
//! verifies.

pub mod bearer;
pub mod directory;
pub mod error;
pub mod jwt;
pub mod options;

pub use bearer::{extract_bearer_token, BearerResolver};
pub use directory::{MemoryDirectory, PrincipalDirectory, PrincipalRecord};
pub use error::AuthError;
pub use jwt::{AccessClaims, JwtVerifier};
pub use options::{JwtAlgorithm, JwtOptions};
