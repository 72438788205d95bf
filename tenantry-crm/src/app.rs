use serde_json::Value;
use tenantry_core::{ScopedApp, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

use crate::services::CrmParams;

/// App with its built-in defaults; the environment may override any key.
pub fn crm_app() -> ScopedApp<Value, CrmParams> {
    let app: ScopedApp<Value, CrmParams> = ScopedApp::new();
    app.set("http.host", "127.0.0.1");
    app.set("http.port", "3030");
    app.set("paginate.default", DEFAULT_PAGE_SIZE.to_string());
    app.set("paginate.max", MAX_PAGE_SIZE.to_string());
    app
}
