use chrono::Utc;
use yieldvault_engine::{
    db_types::{Role, UserId},
    test_utils::{prepare_test_env, random_db_path},
    SqliteDatabase,
};
use yv_common::Secret;

use crate::{
    auth::{AuthClaims, TokenIssuer},
    config::AuthConfig,
};

pub const TEST_TOKEN_SECRET: &str = "endpoint-test-secret-0123456789abcdef";

pub async fn test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to test database")
}

pub fn test_auth_config() -> AuthConfig {
    AuthConfig { token_secret: Secret::new(TEST_TOKEN_SECRET.to_string()) }
}

pub fn issue_token(issuer: &TokenIssuer, user: &str, roles: Vec<Role>) -> String {
    let claims = AuthClaims::new(UserId::from(user), roles, Utc::now().timestamp() + 3600);
    issuer.issue(&claims).expect("Error issuing test token")
}

pub fn bearer(issuer: &TokenIssuer, user: &str, roles: Vec<Role>) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", issue_token(issuer, user, roles)))
}
