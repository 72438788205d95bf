use std::sync::Arc;

use serde_json::Value;
use tenantry_core::{ScopedApp, ServiceMethodKind};

use super::{DealPatch, NewDeal};
use crate::services::relations::{EmbedReference, HoldRelations, RelationLocks, RequireReference};
use crate::services::CrmParams;
use crate::validation::ValidatePayload;

pub fn register_hooks(app: &ScopedApp<Value, CrmParams>, locks: &Arc<RelationLocks>) -> anyhow::Result<()> {
    app.service("deals")?.hooks(|h| {
        h.before_create(Arc::new(ValidatePayload::<NewDeal>::new("Deal")));
        h.before_update(Arc::new(ValidatePayload::<NewDeal>::new("Deal")));
        h.before_patch(Arc::new(ValidatePayload::<DealPatch>::new("Deal")));

        let hold = Arc::new(HoldRelations::shared(locks.clone()));
        h.around(ServiceMethodKind::Create, hold.clone());
        h.around(ServiceMethodKind::Update, hold.clone());
        h.around(ServiceMethodKind::Patch, hold);

        let contact = Arc::new(RequireReference { field: "contact_id", service: "contacts" });
        h.before_create(contact.clone());
        h.before_update(contact.clone());
        h.before_patch(contact);

        h.after(
            ServiceMethodKind::Get,
            Arc::new(EmbedReference { field: "contact_id", service: "contacts", into: "contact" }),
        );
    });
    Ok(())
}
