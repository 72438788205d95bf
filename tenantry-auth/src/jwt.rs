// Access token verification.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tenantry_core::{Identity, PrincipalId, TenantId};

use crate::error::AuthError;
use crate::options::JwtOptions;

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Principal id.
    pub sub: String,
    pub tenant_id: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl AccessClaims {
    /// The principal named by `sub`, bound to `tenant_id`.
    pub fn identity(&self) -> Result<Identity, AuthError> {
        let principal_id = PrincipalId::parse(&self.sub).ok_or(AuthError::InvalidClaims("sub"))?;
        let tenant_id = TenantId::parse(&self.tenant_id).ok_or(AuthError::InvalidClaims("tenant_id"))?;
        Ok(Identity { principal_id, tenant_id })
    }
}

pub struct JwtVerifier {
    options: JwtOptions,
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(options: JwtOptions) -> Result<Self, AuthError> {
        options.validate().map_err(AuthError::Misconfigured)?;

        let mut validation = Validation::new(options.algorithm.to_jsonwebtoken());
        validation.leeway = options.leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);

        if let Some(issuer) = &options.issuer {
            validation.set_issuer(&[issuer.as_str()]);
        }
        if options.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&options.audience);
        }

        Ok(Self {
            key: DecodingKey::from_secret(options.secret.as_bytes()),
            options,
            validation,
        })
    }

    /// Check signature, expiry, issuer, audience and token type.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let data = decode::<AccessClaims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let claims = data.claims;
        if claims.token_type.as_deref() != Some(self.options.token_type.as_str()) {
            return Err(AuthError::WrongTokenType(claims.token_type));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    const SECRET: &str = "test-secret";

    fn claims(token_type: Option<&str>, exp_offset: Duration) -> AccessClaims {
        let now = Utc::now();
        AccessClaims {
            sub: Uuid::new_v4().to_string(),
            tenant_id: Uuid::new_v4().to_string(),
            exp: (now + exp_offset).timestamp() as u64,
            iat: Some(now.timestamp() as u64),
            token_type: token_type.map(str::to_string),
        }
    }

    fn sign(claims: &AccessClaims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(JwtOptions::with_secret(SECRET)).unwrap()
    }

    #[test]
    fn valid_access_token_yields_its_principal() {
        let c = claims(Some("access"), Duration::minutes(5));
        let verified = verifier().verify(&sign(&c, SECRET)).unwrap();

        let identity = verified.identity().unwrap();
        assert_eq!(identity.principal_id.to_string(), c.sub);
        assert_eq!(identity.tenant_id.to_string(), c.tenant_id);
    }

    #[test]
    fn rejects_bad_signature_expiry_and_type() {
        let v = verifier();

        let forged = sign(&claims(Some("access"), Duration::minutes(5)), "other");
        assert!(matches!(v.verify(&forged), Err(AuthError::InvalidToken(_))));

        let expired = sign(&claims(Some("access"), Duration::minutes(-5)), SECRET);
        assert!(matches!(v.verify(&expired), Err(AuthError::InvalidToken(_))));

        let refresh = sign(&claims(Some("refresh"), Duration::minutes(5)), SECRET);
        assert!(matches!(v.verify(&refresh), Err(AuthError::WrongTokenType(_))));

        let untyped = sign(&claims(None, Duration::minutes(5)), SECRET);
        assert!(matches!(v.verify(&untyped), Err(AuthError::WrongTokenType(None))));

        assert!(matches!(v.verify("not.a.jwt"), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn non_uuid_tenant_claim_is_rejected() {
        let mut c = claims(Some("access"), Duration::minutes(5));
        c.tenant_id = "acme".into();
        let verified = verifier().verify(&sign(&c, SECRET)).unwrap();

        assert_eq!(verified.identity(), Err(AuthError::InvalidClaims("tenant_id")));
    }
}
