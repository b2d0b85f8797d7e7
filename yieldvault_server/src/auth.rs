//! Bearer-token authentication.
//!
//! Token issuance is the identity provider's job; this module only *verifies*. A token is
//! `base64url(claims_json) + "." + base64url(hmac_sha256(secret, claims_b64))`, and the verified
//! claims arrive in handlers as an [`AuthClaims`] extractor argument.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header::AUTHORIZATION, web, FromRequest, HttpRequest};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use yieldvault_engine::db_types::{Role, UserId};
use yv_common::Secret;

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClaims {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    /// Unix timestamp after which the token is invalid.
    pub exp: i64,
}

impl AuthClaims {
    pub fn new(user_id: UserId, roles: Vec<Role>, exp: i64) -> Self {
        Self { user_id, roles, exp }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn require_admin(&self) -> Result<(), ServerError> {
        if self.has_role(Role::Admin) {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions("This action requires the admin role.".to_string()).into())
        }
    }
}

/// Verifies (and, for tests and tooling, issues) access tokens against the shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Secret<String>,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { secret: config.token_secret.clone() }
    }

    pub fn issue(&self, claims: &AuthClaims) -> Result<String, ServerError> {
        let payload = serde_json::to_vec(claims)
            .map_err(|e| ServerError::Unspecified(format!("Could not serialize claims: {e}")))?;
        let payload = base64::encode_config(payload, base64::URL_SAFE_NO_PAD);
        let signature = base64::encode_config(self.sign(payload.as_bytes()), base64::URL_SAFE_NO_PAD);
        Ok(format!("{payload}.{signature}"))
    }

    pub fn decode(&self, token: &str) -> Result<AuthClaims, AuthError> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| AuthError::PoorlyFormattedToken("Token must contain exactly one '.'".to_string()))?;
        let signature = base64::decode_config(signature, base64::URL_SAFE_NO_PAD)
            .map_err(|e| AuthError::PoorlyFormattedToken(format!("Signature is not valid base64: {e}")))?;
        let mut mac = HmacSha256::new_from_slice(self.secret.reveal().as_bytes())
            .map_err(|e| AuthError::ValidationError(e.to_string()))?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| AuthError::ValidationError("signature mismatch".to_string()))?;
        let claims = base64::decode_config(payload, base64::URL_SAFE_NO_PAD)
            .map_err(|e| AuthError::PoorlyFormattedToken(format!("Claims are not valid base64: {e}")))?;
        let claims: AuthClaims = serde_json::from_slice(&claims)
            .map_err(|e| AuthError::PoorlyFormattedToken(format!("Claims are not valid JSON: {e}")))?;
        if claims.exp < Utc::now().timestamp() {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        // new_from_slice only fails for unusable key lengths, which HMAC does not have.
        let mut mac = HmacSha256::new_from_slice(self.secret.reveal().as_bytes()).expect("HMAC accepts any key length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

impl FromRequest for AuthClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract_claims(req))
    }
}

fn extract_claims(req: &HttpRequest) -> Result<AuthClaims, ServerError> {
    let issuer = req
        .app_data::<web::Data<TokenIssuer>>()
        .ok_or_else(|| ServerError::InitializeError("TokenIssuer is not configured".to_string()))?;
    let header = req.headers().get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let token = header
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AuthError::PoorlyFormattedToken("Expected 'Authorization: Bearer <token>'".to_string()))?;
    let claims = issuer.decode(token)?;
    Ok(claims)
}

#[cfg(test)]
mod test {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer { secret: Secret::new("a-test-secret-that-is-long-enough!!".to_string()) }
    }

    #[test]
    fn round_trip() {
        let issuer = issuer();
        let claims = AuthClaims::new(UserId::from("u-1"), vec![Role::User], Utc::now().timestamp() + 3600);
        let token = issuer.issue(&claims).unwrap();
        let decoded = issuer.decode(&token).unwrap();
        assert_eq!(decoded.user_id, claims.user_id);
        assert!(decoded.has_role(Role::User));
        assert!(!decoded.has_role(Role::Admin));
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let issuer = issuer();
        let claims = AuthClaims::new(UserId::from("u-1"), vec![Role::User], Utc::now().timestamp() + 3600);
        let mut token = issuer.issue(&claims).unwrap();
        token.replace_range(2..4, "zz");
        assert!(matches!(issuer.decode(&token), Err(AuthError::ValidationError(_) | AuthError::PoorlyFormattedToken(_))));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let issuer = issuer();
        let claims = AuthClaims::new(UserId::from("u-1"), vec![Role::User], Utc::now().timestamp() - 10);
        let token = issuer.issue(&claims).unwrap();
        assert!(matches!(issuer.decode(&token), Err(AuthError::TokenExpired)));
    }
}
