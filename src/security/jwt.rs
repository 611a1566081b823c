use async_trait::async_trait;
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use super::SecurityGate;
use super::claims::UserClaims;
use crate::domain::SecurityContext;

/// Authenticates callers by validating an HS256 token.
///
/// The token subject must equal the caller's user id, and every role and
/// permission the caller presents must be granted by the token.
pub struct JwtSecurityGate {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtSecurityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSecurityGate")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl JwtSecurityGate {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    fn verify(&self, security: &SecurityContext) -> Result<UserClaims, String> {
        let token = security
            .token
            .strip_prefix("Bearer ")
            .unwrap_or(&security.token);

        let claims = decode::<UserClaims>(token, &self.key, &self.validation)
            .map_err(|e| format!("invalid token: {e}"))?
            .claims;

        if claims.sub != security.user_id {
            return Err("token subject does not match user id".to_string());
        }
        if !UserClaims::grants(claims.roles.as_deref(), security.roles.iter()) {
            return Err("roles not granted by token".to_string());
        }
        if !UserClaims::grants(claims.permissions.as_deref(), security.permissions.iter()) {
            return Err("permissions not granted by token".to_string());
        }
        Ok(claims)
    }
}

#[async_trait]
impl SecurityGate for JwtSecurityGate {
    async fn authenticate(&self, security: &SecurityContext) -> bool {
        match self.verify(security) {
            Ok(_) => true,
            Err(reason) => {
                debug!(user_id = %security.user_id, %reason, "Token rejected");
                false
            }
        }
    }
}
