use actix_web::{http::StatusCode, test, web, App};
use chrono::Utc;
use serde_json::json;
use yieldvault_engine::{
    db_types::{PositionStatus, UserId},
    events::EventProducers,
    traits::AccountManagement,
    PositionFlowApi,
    SqliteDatabase,
};
use yv_common::Secret;

use super::helpers::test_db;
use crate::{
    helpers::calculate_hmac,
    middleware::{WebhookHmacFactory, SIGNATURE_HEADER},
    webhook_routes,
};

const WEBHOOK_SECRET: &str = "card-webhook-secret";

fn webhook_app(
    db: SqliteDatabase,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(PositionFlowApi::new(db, EventProducers::default())))
        .service(
            web::scope("/wh/card")
                .wrap(WebhookHmacFactory::new(Secret::new(WEBHOOK_SECRET.to_string()), true))
                .route("", web::post().to(webhook_routes::card_webhook)),
        )
}

fn callback_body(reference: &str, amount: i64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "reference": reference,
        "amount_minor_units": amount,
        "currency": "USD",
        "state": "succeeded",
        "metadata": {
            "user_id": "hook-user",
            "category": "Stocks",
            "tier": "Gold",
            "duration_weeks": 4,
            "auto_reinvest": false
        },
        "created_at": Utc::now()
    }))
    .expect("Error serializing callback body")
}

#[actix_web::test]
async fn unsigned_callbacks_never_reach_the_engine() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let app = test::init_service(webhook_app(db.clone())).await;

    let body = callback_body("ch_sig_1", 50_000);
    let req = test::TestRequest::post()
        .uri("/wh/card")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(db.fetch_positions_for_user(&UserId::from("hook-user")).await.unwrap().is_empty());
}

#[actix_web::test]
async fn mis_signed_callbacks_are_forbidden() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let app = test::init_service(webhook_app(db.clone())).await;

    let body = callback_body("ch_sig_2", 50_000);
    let req = test::TestRequest::post()
        .uri("/wh/card")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((SIGNATURE_HEADER, calculate_hmac("wrong-secret", &body)))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn a_signed_callback_reconciles_and_replays_are_acknowledged() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let app = test::init_service(webhook_app(db.clone())).await;

    let body = callback_body("ch_sig_3", 50_000);
    let signature = calculate_hmac(WEBHOOK_SECRET, &body);
    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/wh/card")
            .insert_header(("Content-Type", "application/json"))
            .insert_header((SIGNATURE_HEADER, signature.clone()))
            .set_payload(body.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        // Receipt is acknowledged with a 2xx both times; the replay is deduped inside the engine.
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let user = UserId::from("hook-user");
    let positions = db.fetch_positions_for_user(&user).await.unwrap();
    assert_eq!(positions.len(), 1, "the replayed callback must not create a second position");
    assert_eq!(positions[0].status, PositionStatus::Active);
    let account = db.fetch_account(&user).await.unwrap().unwrap();
    assert_eq!(account.total_invested.value(), 50_000, "owner totals must increment once");
}
