use std::collections::HashMap;
use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tenantry_core::{bail_scope, FieldValue, Predicate, RecordId, TenantId, TenantScoped};
use validator::Validate;

use crate::services::nullable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealStage {
    #[default]
    New,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl DealStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStage::New => "NEW",
            DealStage::Negotiation => "NEGOTIATION",
            DealStage::ClosedWon => "CLOSED_WON",
            DealStage::ClosedLost => "CLOSED_LOST",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => Some(DealStage::New),
            "NEGOTIATION" => Some(DealStage::Negotiation),
            "CLOSED_WON" => Some(DealStage::ClosedWon),
            "CLOSED_LOST" => Some(DealStage::ClosedLost),
            _ => None,
        }
    }
}

impl fmt::Display for DealStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deal {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub contact_id: RecordId,
    pub title: String,
    pub amount: Option<f64>,
    pub stage: DealStage,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NewDeal {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 chars"))]
    pub title: String,

    #[validate(range(min = 0.0, message = "amount must not be negative"))]
    pub amount: Option<f64>,

    #[serde(default)]
    pub stage: DealStage,

    pub description: Option<String>,

    pub contact_id: RecordId,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DealPatch {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 chars"))]
    pub title: Option<String>,

    #[validate(range(min = 0.0, message = "amount must not be negative"))]
    #[serde(default, deserialize_with = "nullable::field")]
    pub amount: Option<Option<f64>>,

    pub stage: Option<DealStage>,

    #[serde(default, deserialize_with = "nullable::field")]
    pub description: Option<Option<String>>,

    pub contact_id: Option<RecordId>,
}

impl TenantScoped for Deal {
    const COLLECTION: &'static str = "deals";
    const NOUN: &'static str = "Deal";

    type Create = NewDeal;
    type Patch = DealPatch;

    fn id(&self) -> RecordId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_create(id: RecordId, tenant_id: TenantId, now: DateTime<Utc>, p: NewDeal) -> Self {
        Self {
            id,
            tenant_id,
            contact_id: p.contact_id,
            title: p.title,
            amount: p.amount,
            stage: p.stage,
            description: p.description,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: DealPatch, now: DateTime<Utc>) {
        if let Some(v) = patch.title {
            self.title = v;
        }
        if let Some(v) = patch.amount {
            self.amount = v;
        }
        if let Some(v) = patch.stage {
            self.stage = v;
        }
        if let Some(v) = patch.description {
            self.description = v;
        }
        if let Some(v) = patch.contact_id {
            self.contact_id = v;
        }
        self.updated_at = now;
    }

    fn replace(&mut self, p: NewDeal, now: DateTime<Utc>) {
        self.contact_id = p.contact_id;
        self.title = p.title;
        self.amount = p.amount;
        self.stage = p.stage;
        self.description = p.description;
        self.updated_at = now;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "title" => Some(self.title.as_str().into()),
            "stage" => Some(self.stage.as_str().into()),
            "contact_id" => Some(self.contact_id.into()),
            "amount" => self.amount.map(FieldValue::from),
            _ => None,
        }
    }

    fn filter_from_query(query: &HashMap<String, String>) -> Result<Predicate> {
        let mut filter = Predicate::All;

        if let Some(raw) = query.get("stage") {
            let Some(stage) = DealStage::parse(raw) else {
                bail_scope!(bad_request, "Invalid stage: {}", raw);
            };
            filter = filter.and(Predicate::eq("stage", stage.as_str()));
        }

        if let Some(raw) = query.get("contact_id") {
            let Some(contact) = RecordId::parse(raw) else {
                bail_scope!(bad_request, "Invalid contact_id: {}", raw);
            };
            filter = filter.and(Predicate::eq("contact_id", contact));
        }

        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantry_core::{ErrorKind, ScopeError};

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn stage_wire_names() {
        assert_eq!(serde_json::to_value(DealStage::ClosedWon).unwrap(), "CLOSED_WON");
        assert_eq!(DealStage::parse("closed_lost"), Some(DealStage::ClosedLost));
        assert_eq!(DealStage::parse("WON"), None);
    }

    #[test]
    fn filters_combine() {
        let contact = RecordId::new();
        let f = Deal::filter_from_query(&query(&[
            ("stage", "NEGOTIATION"),
            ("contact_id", &contact.to_string()),
        ]))
        .unwrap();

        assert_eq!(
            f,
            Predicate::And(vec![
                Predicate::eq("stage", "NEGOTIATION"),
                Predicate::eq("contact_id", contact),
            ])
        );
    }

    #[test]
    fn bad_filters_are_bad_requests() {
        let err = Deal::filter_from_query(&query(&[("stage", "LOST")])).unwrap_err();
        assert_eq!(ScopeError::kind_of(&err), ErrorKind::BadRequest);

        let err = Deal::filter_from_query(&query(&[("contact_id", "42")])).unwrap_err();
        assert_eq!(ScopeError::kind_of(&err), ErrorKind::BadRequest);
    }

    #[test]
    fn stage_defaults_to_new() {
        let p: NewDeal = serde_json::from_value(serde_json::json!({
            "title": "Sale",
            "contact_id": RecordId::new(),
        }))
        .unwrap();
        assert_eq!(p.stage, DealStage::New);
        assert!(p.validate().is_ok());
    }
}
