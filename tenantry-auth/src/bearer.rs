// Bearer token resolver.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tenantry_core::{AppConfigSnapshot, Identity, PrincipalResolver, ScopeError};
use tracing::{debug, error, warn};

use crate::directory::PrincipalDirectory;
use crate::error::AuthError;
use crate::jwt::JwtVerifier;
use crate::options::JwtOptions;

/// Token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively. Any other scheme, or a
/// missing token, yields `None`.
pub fn extract_bearer_token(headers: &HashMap<String, String>) -> Option<String> {
    let v = headers
        .get("authorization")
        .or_else(|| headers.get("Authorization"))?;

    let (scheme, token) = v.trim().split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Resolves the calling principal from a bearer JWT.
pub struct BearerResolver {
    verifier: JwtVerifier,
    directory: Option<Arc<dyn PrincipalDirectory>>,
}

impl BearerResolver {
    pub fn new(verifier: JwtVerifier) -> Self {
        Self {
            verifier,
            directory: None,
        }
    }

    pub fn from_config(config: &AppConfigSnapshot) -> Result<Self, AuthError> {
        Ok(Self::new(JwtVerifier::new(JwtOptions::from_config(config)?)?))
    }

    pub fn with_directory(mut self, directory: Arc<dyn PrincipalDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub async fn resolve(&self, headers: &HashMap<String, String>) -> Result<Identity, AuthError> {
        let token = extract_bearer_token(headers).ok_or(AuthError::MissingToken)?;
        let identity = self.verifier.verify(&token)?.identity()?;

        if let Some(directory) = &self.directory {
            let record = directory
                .lookup(identity.principal_id)
                .await
                .map_err(|e| AuthError::DirectoryUnavailable(e.to_string()))?
                .ok_or(AuthError::UnknownPrincipal)?;

            if !record.is_active {
                return Err(AuthError::InactivePrincipal);
            }
            if record.tenant_id != identity.tenant_id {
                return Err(AuthError::TenantMismatch);
            }
        }

        Ok(identity)
    }
}

#[async_trait]
impl PrincipalResolver for BearerResolver {
    async fn identify(&self, headers: &HashMap<String, String>) -> Result<Identity> {
        match self.resolve(headers).await {
            Ok(identity) => {
                debug!(principal = %identity.principal_id, tenant = %identity.tenant_id, "authenticated");
                Ok(identity)
            }
            Err(err @ AuthError::DirectoryUnavailable(_)) => {
                error!(reason = %err, "principal directory unavailable");
                Err(ScopeError::from(err).into_anyhow())
            }
            Err(err) => {
                if !matches!(err, AuthError::MissingToken) {
                    warn!(reason = %err, "credential rejected");
                }
                Err(ScopeError::from(err).into_anyhow())
            }
        }
    }
}
