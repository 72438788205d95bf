use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tenantry_core::{FieldValue, Predicate, RecordId, TenantId, TenantScoped};
use validator::Validate;

use crate::services::nullable;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contact {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NewContact {
    #[validate(length(min = 1, max = 100, message = "first_name must be 1-100 chars"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "last_name must be 1-100 chars"))]
    pub last_name: String,

    #[validate(email(message = "email must be a valid email"))]
    pub email: Option<String>,

    #[validate(length(max = 50, message = "phone must be at most 50 chars"))]
    pub phone: Option<String>,

    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ContactPatch {
    #[validate(length(min = 1, max = 100, message = "first_name must be 1-100 chars"))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "last_name must be 1-100 chars"))]
    pub last_name: Option<String>,

    #[validate(email(message = "email must be a valid email"))]
    #[serde(default, deserialize_with = "nullable::field")]
    pub email: Option<Option<String>>,

    #[validate(length(max = 50, message = "phone must be at most 50 chars"))]
    #[serde(default, deserialize_with = "nullable::field")]
    pub phone: Option<Option<String>>,

    #[serde(default, deserialize_with = "nullable::field")]
    pub description: Option<Option<String>>,
}

impl TenantScoped for Contact {
    const COLLECTION: &'static str = "contacts";
    const NOUN: &'static str = "Contact";

    type Create = NewContact;
    type Patch = ContactPatch;

    fn id(&self) -> RecordId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_create(id: RecordId, tenant_id: TenantId, now: DateTime<Utc>, p: NewContact) -> Self {
        Self {
            id,
            tenant_id,
            first_name: p.first_name,
            last_name: p.last_name,
            email: p.email,
            phone: p.phone,
            description: p.description,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: ContactPatch, now: DateTime<Utc>) {
        if let Some(v) = patch.first_name {
            self.first_name = v;
        }
        if let Some(v) = patch.last_name {
            self.last_name = v;
        }
        if let Some(v) = patch.email {
            self.email = v;
        }
        if let Some(v) = patch.phone {
            self.phone = v;
        }
        if let Some(v) = patch.description {
            self.description = v;
        }
        self.updated_at = now;
    }

    fn replace(&mut self, p: NewContact, now: DateTime<Utc>) {
        self.first_name = p.first_name;
        self.last_name = p.last_name;
        self.email = p.email;
        self.phone = p.phone;
        self.description = p.description;
        self.updated_at = now;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "first_name" => Some(self.first_name.as_str().into()),
            "last_name" => Some(self.last_name.as_str().into()),
            "email" => self.email.as_deref().map(FieldValue::from),
            "phone" => self.phone.as_deref().map(FieldValue::from),
            _ => None,
        }
    }

    /// `search` matches first name, last name or email, ignoring case.
    fn filter_from_query(query: &HashMap<String, String>) -> Result<Predicate> {
        let Some(term) = query.get("search").map(|s| s.trim()).filter(|s| !s.is_empty()) else {
            return Ok(Predicate::All);
        };

        Ok(Predicate::any_of(vec![
            Predicate::contains("first_name", term),
            Predicate::contains("last_name", term),
            Predicate::contains("email", term),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn contact(first: &str, last: &str, email: Option<&str>) -> Contact {
        Contact::from_create(
            RecordId::new(),
            TenantId(Uuid::new_v4()),
            Utc::now(),
            NewContact {
                first_name: first.into(),
                last_name: last.into(),
                email: email.map(str::to_string),
                phone: None,
                description: None,
            },
        )
    }

    fn search(term: &str) -> Predicate {
        Contact::filter_from_query(&HashMap::from([("search".to_string(), term.to_string())])).unwrap()
    }

    #[test]
    fn search_spans_names_and_email() {
        let ada = contact("Ada", "Lovelace", Some("ada@example.com"));
        let alan = contact("Alan", "Turing", None);

        assert!(search("love").matches(&ada));
        assert!(search("EXAMPLE").matches(&ada));
        assert!(!search("example").matches(&alan));
        assert!(search("tur").matches(&alan));
    }

    #[test]
    fn blank_search_is_no_filter() {
        assert_eq!(search("  "), Predicate::All);
    }

    #[test]
    fn patch_keeps_unset_fields() {
        let mut c = contact("Ada", "Lovelace", Some("ada@example.com"));
        let before = c.clone();
        c.apply_patch(
            ContactPatch {
                last_name: Some("King".into()),
                ..Default::default()
            },
            Utc::now(),
        );
        assert_eq!(c.last_name, "King");
        assert_eq!(c.email, before.email);
        assert_eq!(c.id, before.id);
        assert_eq!(c.tenant_id, before.tenant_id);
    }
    #[test]
    fn null_clears_and_absent_keeps() {
        let mut c = contact("Ada", "Lovelace", Some("ada@example.com"));
        c.description = Some("met at the expo".into());

        let patch: ContactPatch =
            serde_json::from_value(serde_json::json!({"email": null, "phone": "555-0100"})).unwrap();
        assert!(patch.validate().is_ok());
        c.apply_patch(patch, Utc::now());

        assert_eq!(c.email, None);
        assert_eq!(c.phone.as_deref(), Some("555-0100"));
        assert_eq!(c.description.as_deref(), Some("met at the expo"));
    }
}
