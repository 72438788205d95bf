use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tenantry_core::{AroundHook, ErrorHook, HookContext, Next, ScopedApp};
use tracing::{debug, warn};

use crate::services::CrmParams;

pub struct LogAround;

#[async_trait]
impl AroundHook<Value, CrmParams> for LogAround {
    async fn run(&self, ctx: &mut HookContext<Value, CrmParams>, next: Next<Value, CrmParams>) -> Result<()> {
        let started = Instant::now();
        debug!(provider = %ctx.params.provider, path = %ctx.params.path, "->");

        let res = next.run(ctx).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &res {
            Ok(()) => debug!(elapsed_ms, "<- ok"),
            Err(e) => debug!(elapsed_ms, error = %e, "<- failed"),
        }
        res
    }
}

pub struct LogError;

#[async_trait]
impl ErrorHook<Value, CrmParams> for LogError {
    async fn run(&self, ctx: &mut HookContext<Value, CrmParams>) -> Result<()> {
        if let Some(err) = &ctx.error {
            warn!(service = %ctx.service, method = ctx.method.as_str(), error = %err, "service call failed");
        }
        Ok(())
    }
}

pub fn global_hooks(app: &ScopedApp<Value, CrmParams>) {
    app.hooks(|h| {
        h.around_all(Arc::new(LogAround));
        h.error_all(Arc::new(LogError));
    });
}
