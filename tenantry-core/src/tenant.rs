//! Core multi-tenant types for Tenantry.
//!
//! A [`TenantContext`] is built once per inbound call from a verified
//! [`Principal`] and then passed by reference into services, hooks and
//! the enforcement layer. Nothing in the crate keeps tenant state in a
//! global or thread-local; every operation sees the context it was
//! handed.

use std::collections::HashMap;
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of an isolated customer namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of an authenticated actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub Uuid);

impl PrincipalId {
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a [`PrincipalResolver`] asserts once a credential checks out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub principal_id: PrincipalId,
    pub tenant_id: TenantId,
}

/// An authenticated actor, bound to exactly one tenant.
///
/// Outside this crate the only way to get one is
/// [`Principal::authenticate`], which runs a resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    id: PrincipalId,
    tenant_id: TenantId,
}

impl Principal {
    pub(crate) fn verified(id: PrincipalId, tenant_id: TenantId) -> Self {
        Self { id, tenant_id }
    }

    /// Run `resolver` against the transport headers.
    pub async fn authenticate(
        resolver: &dyn PrincipalResolver,
        headers: &HashMap<String, String>,
    ) -> Result<Self> {
        let identity = resolver.identify(headers).await?;
        Ok(Self::verified(identity.principal_id, identity.tenant_id))
    }

    pub fn id(&self) -> PrincipalId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Context carried with every Tenantry operation.
///
/// Immutable once resolved. There is no constructor that
/// takes a bare tenant id. The only way in is [`TenantContext::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
    principal_id: PrincipalId,
}

impl TenantContext {
    /// Derive the request context from a verified principal.
    pub fn resolve(principal: &Principal) -> Self {
        Self {
            tenant_id: principal.tenant_id(),
            principal_id: principal.id(),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }
}

/// Checks transport credentials and names the caller.
///
/// `headers` are lower-cased header names as seen by the transport.
/// Implementations fail with a `NotAuthenticated` [`crate::ScopeError`]
/// before any context exists.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    async fn identify(&self, headers: &HashMap<String, String>) -> Result<Identity>;
}
