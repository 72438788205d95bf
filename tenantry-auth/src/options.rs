// Verification options.

use serde::{Deserialize, Serialize};
use tenantry_core::AppConfigSnapshot;

use crate::error::AuthError;

/// HMAC algorithms accepted for access tokens.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum JwtAlgorithm {
    #[default]
    HS256,
    HS384,
    HS512,
}

impl JwtAlgorithm {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HS256" => Some(Self::HS256),
            "HS384" => Some(Self::HS384),
            "HS512" => Some(Self::HS512),
            _ => None,
        }
    }

    pub(crate) fn to_jsonwebtoken(self) -> jsonwebtoken::Algorithm {
        match self {
            JwtAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            JwtAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            JwtAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JwtOptions {
    pub algorithm: JwtAlgorithm,
    /// Shared HMAC secret.
    pub secret: String,
    /// Required `iss`, if set.
    pub issuer: Option<String>,
    /// Accepted `aud` values. Empty means `aud` is not checked.
    pub audience: Vec<String>,
    /// Clock skew tolerance for `exp`, in seconds.
    pub leeway_secs: u64,
    /// Required value of the `type` claim.
    pub token_type: String,
}

impl Default for JwtOptions {
    fn default() -> Self {
        Self {
            algorithm: JwtAlgorithm::default(),
            secret: String::new(),
            issuer: None,
            audience: Vec::new(),
            leeway_secs: 0,
            token_type: "access".to_string(),
        }
    }
}

impl JwtOptions {
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.secret.trim().is_empty() {
            return Err("HMAC algorithms require a secret".to_string());
        }
        if self.token_type.trim().is_empty() {
            return Err("Token type cannot be empty".to_string());
        }
        if matches!(&self.issuer, Some(iss) if iss.trim().is_empty()) {
            return Err("JWT issuer cannot be empty when set".to_string());
        }
        Ok(())
    }

    /// Read `auth.*` keys from an app config snapshot.
    ///
    /// `auth.secret` is required. `auth.audience` is a comma separated
    /// list.
    pub fn from_config(config: &AppConfigSnapshot) -> Result<Self, AuthError> {
        let secret = config
            .get_string("auth.secret")
            .ok_or_else(|| AuthError::Misconfigured("auth.secret is not set".to_string()))?;

        let algorithm = match config.get("auth.algorithm") {
            Some(raw) => JwtAlgorithm::parse(raw).ok_or_else(|| {
                AuthError::Misconfigured(format!("unsupported auth.algorithm: {raw}"))
            })?,
            None => JwtAlgorithm::default(),
        };

        let audience = config
            .get("auth.audience")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let options = Self {
            algorithm,
            secret,
            issuer: config.get_string("auth.issuer"),
            audience,
            leeway_secs: config.get_usize("auth.leeway").unwrap_or(0) as u64,
            token_type: config
                .get_string("auth.token_type")
                .unwrap_or_else(|| "access".to_string()),
        };

        options.validate().map_err(AuthError::Misconfigured)?;
        Ok(options)
    }
}
