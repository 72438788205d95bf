//! Fixtures shared by the in-crate tests.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{FieldValue, RecordId, TenantScoped};
use crate::predicate::Predicate;
use crate::tenant::{Principal, PrincipalId, TenantContext, TenantId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewNote {
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotePatch {
    pub title: Option<String>,
    pub score: Option<f64>,
}

impl TenantScoped for Note {
    const COLLECTION: &'static str = "notes";
    const NOUN: &'static str = "Note";

    type Create = NewNote;
    type Patch = NotePatch;

    fn id(&self) -> RecordId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_create(id: RecordId, tenant_id: TenantId, now: DateTime<Utc>, p: NewNote) -> Self {
        Self {
            id,
            tenant_id,
            created_at: now,
            updated_at: now,
            title: p.title,
            score: p.score,
        }
    }

    fn apply_patch(&mut self, patch: NotePatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(score) = patch.score {
            self.score = score;
        }
        self.updated_at = now;
    }

    fn replace(&mut self, p: NewNote, now: DateTime<Utc>) {
        self.title = p.title;
        self.score = p.score;
        self.updated_at = now;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "title" => Some(self.title.clone().into()),
            "score" => Some(self.score.into()),
            _ => None,
        }
    }

    fn filter_from_query(query: &HashMap<String, String>) -> Result<Predicate> {
        Ok(match query.get("search") {
            Some(term) => Predicate::contains("title", term.as_str()),
            None => Predicate::All,
        })
    }
}

pub fn new_note(title: &str, score: f64) -> NewNote {
    NewNote {
        title: title.to_string(),
        score,
    }
}

pub fn note(tenant: TenantId, title: &str, score: f64) -> Note {
    Note::from_create(RecordId::new(), tenant, Utc::now(), new_note(title, score))
}

pub fn tenant() -> TenantId {
    TenantId(Uuid::new_v4())
}

pub fn ctx(tenant: TenantId) -> TenantContext {
    TenantContext::resolve(&Principal::verified(PrincipalId(Uuid::new_v4()), tenant))
}
