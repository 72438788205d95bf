use std::sync::Arc;

use serde_json::Value;
use tenantry_core::{ScopedApp, ServiceMethodKind};

use super::{NewViewing, ViewingPatch};
use crate::services::relations::{HoldRelations, RelationLocks, RequireReference};
use crate::services::CrmParams;
use crate::validation::ValidatePayload;

pub fn register_hooks(app: &ScopedApp<Value, CrmParams>, locks: &Arc<RelationLocks>) -> anyhow::Result<()> {
    app.service("viewings")?.hooks(|h| {
        h.before_create(Arc::new(ValidatePayload::<NewViewing>::new("Viewing")));
        h.before_update(Arc::new(ValidatePayload::<NewViewing>::new("Viewing")));
        h.before_patch(Arc::new(ValidatePayload::<ViewingPatch>::new("Viewing")));

        let hold = Arc::new(HoldRelations::shared(locks.clone()));
        h.around(ServiceMethodKind::Create, hold.clone());
        h.around(ServiceMethodKind::Update, hold);

        let property = Arc::new(RequireReference { field: "property_id", service: "properties" });
        let contact = Arc::new(RequireReference { field: "contact_id", service: "contacts" });
        h.before_create(property.clone());
        h.before_create(contact.clone());
        h.before_update(property);
        h.before_update(contact);
    });
    Ok(())
}
