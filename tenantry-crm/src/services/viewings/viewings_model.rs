use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tenantry_core::{bail_scope, FieldValue, Predicate, RecordId, TenantId, TenantScoped};
use validator::Validate;

use crate::services::nullable;

pub const DEFAULT_VIEWING_STATUS: &str = "SCHEDULED";

fn default_status() -> String {
    DEFAULT_VIEWING_STATUS.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Viewing {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub property_id: RecordId,
    pub contact_id: RecordId,
    pub viewing_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NewViewing {
    pub property_id: RecordId,
    pub contact_id: RecordId,
    pub viewing_date: DateTime<Utc>,
    pub notes: Option<String>,

    #[serde(default = "default_status")]
    #[validate(length(min = 1, max = 50, message = "status must be 1-50 chars"))]
    pub status: String,
}

/// A viewing keeps its property and contact for life.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ViewingPatch {
    pub viewing_date: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "nullable::field")]
    pub notes: Option<Option<String>>,

    #[validate(length(min = 1, max = 50, message = "status must be 1-50 chars"))]
    pub status: Option<String>,
}

impl TenantScoped for Viewing {
    const COLLECTION: &'static str = "viewings";
    const NOUN: &'static str = "Viewing";

    type Create = NewViewing;
    type Patch = ViewingPatch;

    fn id(&self) -> RecordId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_create(id: RecordId, tenant_id: TenantId, now: DateTime<Utc>, p: NewViewing) -> Self {
        Self {
            id,
            tenant_id,
            property_id: p.property_id,
            contact_id: p.contact_id,
            viewing_date: p.viewing_date,
            notes: p.notes,
            status: p.status,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: ViewingPatch, now: DateTime<Utc>) {
        if let Some(v) = patch.viewing_date {
            self.viewing_date = v;
        }
        if let Some(v) = patch.notes {
            self.notes = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        self.updated_at = now;
    }

    fn replace(&mut self, p: NewViewing, now: DateTime<Utc>) {
        self.property_id = p.property_id;
        self.contact_id = p.contact_id;
        self.viewing_date = p.viewing_date;
        self.notes = p.notes;
        self.status = p.status;
        self.updated_at = now;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "property_id" => Some(self.property_id.into()),
            "contact_id" => Some(self.contact_id.into()),
            "status" => Some(self.status.as_str().into()),
            "viewing_date" => Some(self.viewing_date.into()),
            _ => None,
        }
    }

    fn filter_from_query(query: &HashMap<String, String>) -> Result<Predicate> {
        let mut filter = Predicate::All;

        for key in ["property_id", "contact_id"] {
            if let Some(raw) = query.get(key) {
                let Some(id) = RecordId::parse(raw) else {
                    bail_scope!(bad_request, "Invalid {}: {}", key, raw);
                };
                filter = filter.and(Predicate::eq(key, id));
            }
        }

        if let Some(status) = query.get("status").map(|s| s.trim()).filter(|s| !s.is_empty()) {
            filter = filter.and(Predicate::eq("status", status));
        }

        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_defaults_to_scheduled() {
        let p: NewViewing = serde_json::from_value(json!({
            "property_id": RecordId::new(),
            "contact_id": RecordId::new(),
            "viewing_date": "2026-03-01T10:00:00Z",
        }))
        .unwrap();
        assert_eq!(p.status, DEFAULT_VIEWING_STATUS);
    }

    #[test]
    fn patch_cannot_move_a_viewing() {
        let res: Result<ViewingPatch, _> =
            serde_json::from_value(json!({"property_id": RecordId::new()}));
        assert!(res.is_err());
    }

    #[test]
    fn filters_on_references_and_status() {
        let property = RecordId::new();
        let q = HashMap::from([
            ("property_id".to_string(), property.to_string()),
            ("status".to_string(), "DONE".to_string()),
        ]);
        assert_eq!(
            Viewing::filter_from_query(&q).unwrap(),
            Predicate::And(vec![
                Predicate::eq("property_id", property),
                Predicate::eq("status", "DONE"),
            ])
        );
    }
}
