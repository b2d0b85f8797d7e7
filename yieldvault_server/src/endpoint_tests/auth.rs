use actix_web::{http::StatusCode, test, web, App};
use yieldvault_engine::{db_types::Role, AccountApi};

use super::helpers::{bearer, test_auth_config, test_db};
use crate::{auth::TokenIssuer, routes};

#[actix_web::test]
async fn requests_without_a_token_are_unauthorized() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let issuer = TokenIssuer::new(&test_auth_config());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(issuer))
            .app_data(web::Data::new(AccountApi::new(db)))
            .service(web::scope("/api").service(routes::my_positions)),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/positions").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn tampered_tokens_are_unauthorized() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let issuer = TokenIssuer::new(&test_auth_config());
    let (name, value) = bearer(&issuer, "alice", vec![Role::User]);
    let broken = format!("{}AAAA", &value[..value.len() - 4]);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(issuer))
            .app_data(web::Data::new(AccountApi::new(db)))
            .service(web::scope("/api").service(routes::my_positions)),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/positions").insert_header((name, broken)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn a_valid_token_lets_a_user_through() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let issuer = TokenIssuer::new(&test_auth_config());
    let header = bearer(&issuer, "alice", vec![Role::User]);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(issuer))
            .app_data(web::Data::new(AccountApi::new(db)))
            .service(web::scope("/api").service(routes::my_positions)),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/positions").insert_header(header).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
