//! The contract every persisted, tenant-owned record type implements.
//!
//! The enforcement layer in [`crate::scope`] is written once against
//! [`TenantScoped`]; contacts, deals, properties and any future entity get
//! isolation by implementing it, never by special-casing.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::predicate::Predicate;
use crate::tenant::TenantId;

/// Store-assigned record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A field value as seen by predicate evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Id(Uuid),
    Time(DateTime<Utc>),
    Bool(bool),
}

impl FieldValue {
    /// Ordering between two values of the same variant; `None` otherwise.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
            (FieldValue::Number(a), FieldValue::Number(b)) => a.partial_cmp(b),
            (FieldValue::Id(a), FieldValue::Id(b)) => Some(a.cmp(b)),
            (FieldValue::Time(a), FieldValue::Time(b)) => Some(a.cmp(b)),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "'{s}'"),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Id(id) => write!(f, "'{id}'"),
            FieldValue::Time(t) => write!(f, "'{}'", t.to_rfc3339()),
            FieldValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<RecordId> for FieldValue {
    fn from(v: RecordId) -> Self {
        FieldValue::Id(v.0)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Time(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

/// Capability every tenant-owned entity satisfies.
///
/// `Create` and `Patch` are the entity's input payloads. Neither carries a
/// tenant: the tenant is always supplied by the layer from the active
/// context, and `apply_patch` / `replace` must leave `id`, `tenant_id` and
/// `created_at` untouched.
pub trait TenantScoped: Clone + Send + Sync + 'static {
    /// Storage collection name, e.g. `"contacts"`.
    const COLLECTION: &'static str;
    /// Human noun used in the uniform not-found message, e.g. `"Contact"`.
    const NOUN: &'static str;

    type Create: Send + 'static;
    type Patch: Send + 'static;

    fn id(&self) -> RecordId;
    fn tenant_id(&self) -> TenantId;
    fn created_at(&self) -> DateTime<Utc>;

    fn from_create(
        id: RecordId,
        tenant_id: TenantId,
        now: DateTime<Utc>,
        payload: Self::Create,
    ) -> Self;

    fn apply_patch(&mut self, patch: Self::Patch, now: DateTime<Utc>);

    fn replace(&mut self, payload: Self::Create, now: DateTime<Utc>);

    /// Value of a named field for predicate evaluation.
    fn field(&self, name: &str) -> Option<FieldValue>;

    /// Caller filter built from query parameters (search terms, status
    /// filters, ranges). Never includes the tenant; the layer adds that.
    fn filter_from_query(_query: &HashMap<String, String>) -> Result<Predicate> {
        Ok(Predicate::All)
    }
}
