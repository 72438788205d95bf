use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tenantry_core::{bail_scope, FieldValue, Predicate, RecordId, TenantId, TenantScoped};
use validator::Validate;

use crate::services::nullable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    #[default]
    House,
    Apartment,
    Commercial,
    Land,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::House => "HOUSE",
            PropertyType::Apartment => "APARTMENT",
            PropertyType::Commercial => "COMMERCIAL",
            PropertyType::Land => "LAND",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HOUSE" => Some(PropertyType::House),
            "APARTMENT" => Some(PropertyType::Apartment),
            "COMMERCIAL" => Some(PropertyType::Commercial),
            "LAND" => Some(PropertyType::Land),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyStatus {
    #[default]
    Available,
    Sold,
    Rented,
    Pending,
}

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::Available => "AVAILABLE",
            PropertyStatus::Sold => "SOLD",
            PropertyStatus::Rented => "RENTED",
            PropertyStatus::Pending => "PENDING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AVAILABLE" => Some(PropertyStatus::Available),
            "SOLD" => Some(PropertyStatus::Sold),
            "RENTED" => Some(PropertyStatus::Rented),
            "PENDING" => Some(PropertyStatus::Pending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub title: String,
    pub address: String,
    pub price: Option<f64>,
    pub property_type: PropertyType,
    pub status: PropertyStatus,
    pub description: Option<String>,
    pub bedrooms: Option<String>,
    pub bathrooms: Option<String>,
    pub area_sqm: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct NewProperty {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 chars"))]
    pub title: String,

    #[validate(length(min = 1, max = 500, message = "address must be 1-500 chars"))]
    pub address: String,

    #[validate(range(min = 0.0, message = "price must not be negative"))]
    pub price: Option<f64>,

    #[serde(default)]
    pub property_type: PropertyType,

    #[serde(default)]
    pub status: PropertyStatus,

    pub description: Option<String>,

    #[validate(length(max = 10, message = "bedrooms must be at most 10 chars"))]
    pub bedrooms: Option<String>,

    #[validate(length(max = 10, message = "bathrooms must be at most 10 chars"))]
    pub bathrooms: Option<String>,

    #[validate(range(min = 0.0, message = "area_sqm must not be negative"))]
    pub area_sqm: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PropertyPatch {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 chars"))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 500, message = "address must be 1-500 chars"))]
    pub address: Option<String>,

    #[validate(range(min = 0.0, message = "price must not be negative"))]
    #[serde(default, deserialize_with = "nullable::field")]
    pub price: Option<Option<f64>>,

    pub property_type: Option<PropertyType>,

    pub status: Option<PropertyStatus>,

    #[serde(default, deserialize_with = "nullable::field")]
    pub description: Option<Option<String>>,

    #[validate(length(max = 10, message = "bedrooms must be at most 10 chars"))]
    #[serde(default, deserialize_with = "nullable::field")]
    pub bedrooms: Option<Option<String>>,

    #[validate(length(max = 10, message = "bathrooms must be at most 10 chars"))]
    #[serde(default, deserialize_with = "nullable::field")]
    pub bathrooms: Option<Option<String>>,

    #[validate(range(min = 0.0, message = "area_sqm must not be negative"))]
    #[serde(default, deserialize_with = "nullable::field")]
    pub area_sqm: Option<Option<f64>>,
}

impl TenantScoped for Property {
    const COLLECTION: &'static str = "properties";
    const NOUN: &'static str = "Property";

    type Create = NewProperty;
    type Patch = PropertyPatch;

    fn id(&self) -> RecordId {
        self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_create(id: RecordId, tenant_id: TenantId, now: DateTime<Utc>, p: NewProperty) -> Self {
        Self {
            id,
            tenant_id,
            title: p.title,
            address: p.address,
            price: p.price,
            property_type: p.property_type,
            status: p.status,
            description: p.description,
            bedrooms: p.bedrooms,
            bathrooms: p.bathrooms,
            area_sqm: p.area_sqm,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: PropertyPatch, now: DateTime<Utc>) {
        if let Some(v) = patch.title {
            self.title = v;
        }
        if let Some(v) = patch.address {
            self.address = v;
        }
        if let Some(v) = patch.price {
            self.price = v;
        }
        if let Some(v) = patch.property_type {
            self.property_type = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.description {
            self.description = v;
        }
        if let Some(v) = patch.bedrooms {
            self.bedrooms = v;
        }
        if let Some(v) = patch.bathrooms {
            self.bathrooms = v;
        }
        if let Some(v) = patch.area_sqm {
            self.area_sqm = v;
        }
        self.updated_at = now;
    }

    fn replace(&mut self, p: NewProperty, now: DateTime<Utc>) {
        self.title = p.title;
        self.address = p.address;
        self.price = p.price;
        self.property_type = p.property_type;
        self.status = p.status;
        self.description = p.description;
        self.bedrooms = p.bedrooms;
        self.bathrooms = p.bathrooms;
        self.area_sqm = p.area_sqm;
        self.updated_at = now;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "title" => Some(self.title.as_str().into()),
            "address" => Some(self.address.as_str().into()),
            "property_type" => Some(self.property_type.as_str().into()),
            "status" => Some(self.status.as_str().into()),
            "price" => self.price.map(FieldValue::from),
            "area_sqm" => self.area_sqm.map(FieldValue::from),
            _ => None,
        }
    }

    /// Records without a price never match a price bound.
    fn filter_from_query(query: &HashMap<String, String>) -> Result<Predicate> {
        let mut filter = Predicate::All;

        if let Some(raw) = query.get("property_type") {
            let Some(kind) = PropertyType::parse(raw) else {
                bail_scope!(bad_request, "Invalid property_type: {}", raw);
            };
            filter = filter.and(Predicate::eq("property_type", kind.as_str()));
        }

        if let Some(raw) = query.get("status") {
            let Some(status) = PropertyStatus::parse(raw) else {
                bail_scope!(bad_request, "Invalid status: {}", raw);
            };
            filter = filter.and(Predicate::eq("status", status.as_str()));
        }

        if let Some(min) = price_bound(query, "min_price")? {
            filter = filter.and(Predicate::gte("price", min));
        }
        if let Some(max) = price_bound(query, "max_price")? {
            filter = filter.and(Predicate::lte("price", max));
        }

        Ok(filter)
    }
}

fn price_bound(query: &HashMap<String, String>, key: &str) -> Result<Option<f64>> {
    let Some(raw) = query.get(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(Some(v)),
        _ => bail_scope!(bad_request, "Invalid {}: {}", key, raw),
    }
}
