use std::sync::Arc;

use tenantry_core::{PrincipalResolver, ScopedApp};

/// Router state shared by every REST handler of one app.
pub struct ScopedAxumState<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub app: ScopedApp<R, P>,
    pub resolver: Arc<dyn PrincipalResolver>,
}

impl<R, P> Clone for ScopedAxumState<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            app: self.app.clone(),
            resolver: Arc::clone(&self.resolver),
        }
    }
}
