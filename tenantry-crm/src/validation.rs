use std::collections::BTreeMap;
use std::marker::PhantomData;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tenantry_core::entity_service::strip_server_owned;
use tenantry_core::{BeforeHook, HookContext, ScopeError};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::services::CrmParams;

fn friendly_message(code: &str) -> Option<&'static str> {
    match code {
        "required" => Some("is required"),
        "email" => Some("must be a valid email"),
        "length" => Some("has invalid length"),
        "range" => Some("is out of range"),
        _ => None,
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

fn push_errors(out: &mut BTreeMap<String, Vec<String>>, prefix: &str, errs: &ValidationErrors) {
    for (field, kind) in errs.errors() {
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let key = join_path(prefix, field);
                for e in field_errors {
                    let msg = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .or_else(|| friendly_message(&e.code).map(|m| m.to_string()))
                        .unwrap_or_else(|| e.code.to_string());
                    out.entry(key.clone()).or_default().push(msg);
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                push_errors(out, &join_path(prefix, field), nested.as_ref());
            }
            ValidationErrorsKind::List(items) => {
                let base = join_path(prefix, field);
                for (idx, nested) in items {
                    push_errors(out, &format!("{base}[{idx}]"), nested.as_ref());
                }
            }
        }
    }
}

/// `{field: [messages]}` for a 422 body.
pub fn field_errors(errs: &ValidationErrors) -> Value {
    let mut out = BTreeMap::new();
    push_errors(&mut out, "", errs);
    json!(out)
}

/// Decode and validate a JSON payload as `T`.
pub fn validate<T>(data: &Value, error_message: &str) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let parsed: T = serde_json::from_value(data.clone()).map_err(|e| {
        ScopeError::unprocessable(error_message)
            .with_errors(json!({"_schema": [e.to_string()]}))
            .into_anyhow()
    })?;

    parsed.validate().map_err(|e| {
        ScopeError::unprocessable(error_message)
            .with_errors(field_errors(&e))
            .into_anyhow()
    })?;

    Ok(parsed)
}

/// Before hook rejecting payloads that do not validate as `T`.
///
/// Server-owned keys are stripped first, so a smuggled `tenant_id` is
/// dropped rather than reported as an unknown field.
pub struct ValidatePayload<T> {
    error_message: String,
    _payload: PhantomData<fn() -> T>,
}

impl<T> ValidatePayload<T> {
    pub fn new(noun: &str) -> Self {
        Self {
            error_message: format!("{noun} validation failed"),
            _payload: PhantomData,
        }
    }
}

#[async_trait]
impl<T> BeforeHook<Value, CrmParams> for ValidatePayload<T>
where
    T: DeserializeOwned + Validate + 'static,
{
    async fn run(&self, ctx: &mut HookContext<Value, CrmParams>) -> Result<()> {
        let tenant = ctx.tenant().clone();
        let Some(data) = ctx.data.as_mut() else {
            return Ok(());
        };

        let Some(map) = data.as_object_mut() else {
            return Err(ScopeError::unprocessable(self.error_message.as_str())
                .with_errors(json!({"_schema": ["payload must be a JSON object"]}))
                .into_anyhow());
        };
        strip_server_owned(&tenant, &ctx.service, map);

        validate::<T>(data, &self.error_message)?;
        Ok(())
    }
}
