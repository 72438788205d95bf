use std::sync::Arc;

use serde_json::Value;
use tenantry_core::{ScopedApp, ServiceMethodKind};

use super::{ContactPatch, NewContact};
use crate::services::relations::{CascadeRemove, HoldRelations, RelationLocks};
use crate::services::CrmParams;
use crate::validation::ValidatePayload;

pub fn register_hooks(app: &ScopedApp<Value, CrmParams>, locks: &Arc<RelationLocks>) -> anyhow::Result<()> {
    app.service("contacts")?.hooks(|h| {
        h.before_create(Arc::new(ValidatePayload::<NewContact>::new("Contact")));
        h.before_update(Arc::new(ValidatePayload::<NewContact>::new("Contact")));
        h.before_patch(Arc::new(ValidatePayload::<ContactPatch>::new("Contact")));

        h.around(ServiceMethodKind::Remove, Arc::new(HoldRelations::exclusive(locks.clone())));
        h.before_remove(Arc::new(CascadeRemove { service: "deals", field: "contact_id" }));
        h.before_remove(Arc::new(CascadeRemove { service: "viewings", field: "contact_id" }));
    });
    Ok(())
}
