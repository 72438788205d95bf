use tenantry_core::ScopeError;
use thiserror::Error;

/// Why a credential was refused.
///
/// The variants are for server-side logs. Clients only ever see one of
/// two messages, so a caller cannot tell a bad signature from an unknown
/// or inactive principal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("no bearer token")]
    MissingToken,

    #[error("token rejected: {0}")]
    InvalidToken(String),

    #[error("unexpected token type: {0:?}")]
    WrongTokenType(Option<String>),

    #[error("malformed claim: {0}")]
    InvalidClaims(&'static str),

    #[error("principal not found")]
    UnknownPrincipal,

    #[error("principal inactive")]
    InactivePrincipal,

    #[error("token tenant does not match principal")]
    TenantMismatch,

    #[error("principal directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("authentication misconfigured: {0}")]
    Misconfigured(String),
}

pub const NOT_AUTHENTICATED: &str = "Not authenticated";
pub const INVALID_CREDENTIALS: &str = "Could not validate credentials";
pub const AUTH_UNAVAILABLE: &str = "Authentication is temporarily unavailable";

impl From<AuthError> for ScopeError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => ScopeError::not_authenticated(NOT_AUTHENTICATED),
            AuthError::DirectoryUnavailable(_) => ScopeError::unavailable(AUTH_UNAVAILABLE),
            AuthError::Misconfigured(msg) => {
                ScopeError::general_error(format!("Authentication misconfigured: {msg}"))
            }
            _ => ScopeError::not_authenticated(INVALID_CREDENTIALS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantry_core::ErrorKind;

    #[test]
    fn credential_failures_share_one_client_message() {
        for err in [
            AuthError::InvalidToken("ExpiredSignature".into()),
            AuthError::WrongTokenType(Some("refresh".into())),
            AuthError::InvalidClaims("sub"),
            AuthError::UnknownPrincipal,
            AuthError::InactivePrincipal,
            AuthError::TenantMismatch,
        ] {
            let scope = ScopeError::from(err);
            assert_eq!(scope.kind, ErrorKind::NotAuthenticated);
            assert_eq!(scope.message, INVALID_CREDENTIALS);
        }

        assert_eq!(ScopeError::from(AuthError::MissingToken).message, NOT_AUTHENTICATED);

        let outage = ScopeError::from(AuthError::DirectoryUnavailable("timeout".into()));
        assert_eq!(outage.kind, ErrorKind::Unavailable);
        assert_eq!(outage.message, AUTH_UNAVAILABLE);
    }
}
