use actix_web::{http::StatusCode, test, web, App};
use processor_tools::{ProcessorApi, ProcessorConfig};
use serde_json::json;
use yieldvault_engine::{
    adapters::ManualChannelDefaults,
    db_types::{Position, PositionStatus, Role},
    events::EventProducers,
    AccountApi,
    PositionFlowApi,
    SqliteDatabase,
};

use super::helpers::{bearer, test_auth_config, test_db};
use crate::{
    auth::TokenIssuer,
    integrations::processors::{InstantAdapters, ProcessorAdapter},
    routes,
};

fn api_app(
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
    let issuer = TokenIssuer::new(&test_auth_config());
    // The instant adapters never get called in these tests, but the extractor wants them present.
    let processor = ProcessorApi::new(ProcessorConfig::default()).expect("Error building processor client");
    let adapters =
        InstantAdapters { card: ProcessorAdapter::card(processor.clone()), wallet: ProcessorAdapter::wallet(processor) };
    App::new()
        .app_data(web::Data::new(issuer))
        .app_data(web::Data::new(PositionFlowApi::new(db.clone(), EventProducers::default())))
        .app_data(web::Data::new(AccountApi::new(db)))
        .app_data(web::Data::new(adapters))
        .app_data(web::Data::new(ManualChannelDefaults::default()))
        .service(
            web::scope("/api")
                .service(routes::new_position)
                .service(routes::my_positions)
                .service(routes::position_by_id)
                .service(routes::pending_positions)
                .service(routes::approve_position),
        )
}

#[actix_web::test]
async fn manual_submission_round_trips_through_the_pull_path() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let issuer = TokenIssuer::new(&test_auth_config());
    let app = test::init_service(api_app(db)).await;

    let body = json!({
        "category": "Crypto",
        "tier": "Gold",
        "principal": 50_000,
        "duration_weeks": 4,
        "channel": "Crypto"
    });
    let req = test::TestRequest::post()
        .uri("/api/positions")
        .insert_header(bearer(&issuer, "alice", vec![Role::User]))
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // The position is recoverable via pull even if every push notification was missed.
    let req = test::TestRequest::get()
        .uri("/api/positions")
        .insert_header(bearer(&issuer, "alice", vec![Role::User]))
        .to_request();
    let positions: Vec<Position> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].status, PositionStatus::Pending);
    assert!(positions[0].instructions.is_some());

    // Another user cannot see it.
    let req = test::TestRequest::get()
        .uri(&format!("/api/positions/{}", positions[0].id))
        .insert_header(bearer(&issuer, "mallory", vec![Role::User]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn admin_routes_reject_ordinary_users() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let issuer = TokenIssuer::new(&test_auth_config());
    let app = test::init_service(api_app(db)).await;

    let req = test::TestRequest::get()
        .uri("/api/admin/positions/pending")
        .insert_header(bearer(&issuer, "alice", vec![Role::User]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri("/api/admin/positions/pending")
        .insert_header(bearer(&issuer, "root", vec![Role::User, Role::Admin]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn a_below_minimum_principal_is_a_bad_request() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let issuer = TokenIssuer::new(&test_auth_config());
    let app = test::init_service(api_app(db)).await;

    let body = json!({
        "category": "Crypto",
        "tier": "Gold",
        "principal": 500,
        "duration_weeks": 4,
        "channel": "Crypto"
    });
    let req = test::TestRequest::post()
        .uri("/api/positions")
        .insert_header(bearer(&issuer, "alice", vec![Role::User]))
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
