use std::sync::Arc;

use serde_json::Value;
use tenantry_core::{ScopedApp, ServiceMethodKind};

use super::{NewProperty, PropertyPatch};
use crate::services::relations::{CascadeRemove, HoldRelations, RelationLocks};
use crate::services::CrmParams;
use crate::validation::ValidatePayload;

pub fn register_hooks(app: &ScopedApp<Value, CrmParams>, locks: &Arc<RelationLocks>) -> anyhow::Result<()> {
    app.service("properties")?.hooks(|h| {
        h.before_create(Arc::new(ValidatePayload::<NewProperty>::new("Property")));
        h.before_update(Arc::new(ValidatePayload::<NewProperty>::new("Property")));
        h.before_patch(Arc::new(ValidatePayload::<PropertyPatch>::new("Property")));

        h.around(ServiceMethodKind::Remove, Arc::new(HoldRelations::exclusive(locks.clone())));
        h.before_remove(Arc::new(CascadeRemove { service: "viewings", field: "property_id" }));
    });
    Ok(())
}
