//! Predicate composition.
//!
//! Caller filters are plain data ([`Predicate`]). Storage only ever sees a
//! [`ScopedPredicate`], which can only be built from a [`TenantContext`]
//! and always reads as `tenant_id = <ctx tenant> AND <caller filter>`.

use std::cmp::Ordering;
use std::fmt;

use crate::entity::{FieldValue, TenantScoped};
use crate::tenant::{TenantContext, TenantId};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every record.
    All,
    Eq(String, FieldValue),
    /// Case-insensitive substring match on a text field.
    Contains(String, String),
    Gte(String, FieldValue),
    Lte(String, FieldValue),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Predicate::Eq(field.into(), value.into())
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Predicate::Contains(field.into(), needle.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Predicate::Gte(field.into(), value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Predicate::Lte(field.into(), value.into())
    }

    /// `self AND other`, flattening `All` away.
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::All, p) | (p, Predicate::All) => p,
            (Predicate::And(mut a), Predicate::And(b)) => {
                a.extend(b);
                Predicate::And(a)
            }
            (Predicate::And(mut a), p) => {
                a.push(p);
                Predicate::And(a)
            }
            (p, q) => Predicate::And(vec![p, q]),
        }
    }

    pub fn any_of(preds: Vec<Predicate>) -> Self {
        if preds.is_empty() {
            Predicate::All
        } else {
            Predicate::Or(preds)
        }
    }

    pub fn matches<E: TenantScoped>(&self, record: &E) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Eq(field, value) => record
                .field(field)
                .is_some_and(|v| v.compare(value) == Some(Ordering::Equal)),
            Predicate::Contains(field, needle) => match record.field(field) {
                Some(FieldValue::Text(text)) => {
                    text.to_lowercase().contains(&needle.to_lowercase())
                }
                _ => false,
            },
            Predicate::Gte(field, value) => record.field(field).is_some_and(|v| {
                matches!(v.compare(value), Some(Ordering::Greater | Ordering::Equal))
            }),
            Predicate::Lte(field, value) => record.field(field).is_some_and(|v| {
                matches!(v.compare(value), Some(Ordering::Less | Ordering::Equal))
            }),
            Predicate::And(preds) => preds.iter().all(|p| p.matches(record)),
            Predicate::Or(preds) => preds.iter().any(|p| p.matches(record)),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, preds: &[Predicate], sep: &str) -> fmt::Result {
            write!(f, "(")?;
            for (i, p) in preds.iter().enumerate() {
                if i > 0 {
                    write!(f, " {sep} ")?;
                }
                write!(f, "{p}")?;
            }
            write!(f, ")")
        }

        match self {
            Predicate::All => write!(f, "TRUE"),
            Predicate::Eq(field, v) => write!(f, "{field} = {v}"),
            Predicate::Contains(field, needle) => write!(f, "{field} ILIKE '%{needle}%'"),
            Predicate::Gte(field, v) => write!(f, "{field} >= {v}"),
            Predicate::Lte(field, v) => write!(f, "{field} <= {v}"),
            Predicate::And(preds) => join(f, preds, "AND"),
            Predicate::Or(preds) => join(f, preds, "OR"),
        }
    }
}

/// A caller filter bound to the tenant of the active context.
///
/// This is the only predicate type a [`crate::store::RecordStore`] accepts
/// for multi-record reads, so the tenant condition cannot be left out.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedPredicate {
    tenant_id: TenantId,
    filter: Predicate,
}

impl ScopedPredicate {
    pub fn new(ctx: &TenantContext, filter: Predicate) -> Self {
        Self {
            tenant_id: ctx.tenant_id(),
            filter,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn filter(&self) -> &Predicate {
        &self.filter
    }

    pub fn matches<E: TenantScoped>(&self, record: &E) -> bool {
        record.tenant_id() == self.tenant_id && self.filter.matches(record)
    }
}

impl fmt::Display for ScopedPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tenant_id = '{}' AND {}", self.tenant_id, self.filter)
    }
}
