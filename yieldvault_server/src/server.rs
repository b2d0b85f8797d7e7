use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use futures::future::BoxFuture;
use log::*;
use processor_tools::{ProcessorApi, ProcessorConfig};
use yieldvault_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    AccountApi,
    PositionFlowApi,
    SqliteDatabase,
};

use crate::{
    auth::TokenIssuer,
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::processors::{InstantAdapters, ProcessorAdapter},
    middleware::WebhookHmacFactory,
    push::{PushMessage, PushNotifier},
    routes,
    valuation_worker::start_valuation_worker,
    webhook_routes,
};

const EVENT_BUFFER_SIZE: usize = 16;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let notifier = PushNotifier::new();
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, push_hooks(notifier.clone()));
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let _worker =
        start_valuation_worker(db.clone(), producers.clone(), config.valuation_interval_secs, config.pending_expiry);
    let srv = create_server_instance(config, db, producers, notifier)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Wire the engine's event hooks into the per-user push rooms. This is the only place the
/// notification transport touches the engine: swap the closures and the transport changes.
pub fn push_hooks(notifier: PushNotifier) -> EventHooks {
    let mut hooks = EventHooks::default();
    let n = notifier.clone();
    hooks.on_status_changed(move |event| {
        let notifier = n.clone();
        Box::pin(async move {
            notifier.publish(PushMessage::PositionStatusChanged(event)).await;
        }) as BoxFuture<'static, ()>
    });
    hooks.on_instructions_ready(move |event| {
        let notifier = notifier.clone();
        Box::pin(async move {
            notifier.publish(PushMessage::PaymentInstructionsReady(event)).await;
        }) as BoxFuture<'static, ()>
    });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
    notifier: PushNotifier,
) -> Result<Server, ServerError> {
    let card_api = ProcessorApi::new(ProcessorConfig::card_from_env_or_default())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let wallet_api = ProcessorApi::new(ProcessorConfig::wallet_from_env_or_default())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let adapters = InstantAdapters { card: ProcessorAdapter::card(card_api), wallet: ProcessorAdapter::wallet(wallet_api) };
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let flow_api = PositionFlowApi::new(db.clone(), producers.clone());
        let accounts_api = AccountApi::new(db.clone());
        let token_issuer = TokenIssuer::new(&config.auth);
        let options = ServerOptions::from_config(&config);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("yvs::access_log"))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(accounts_api))
            .app_data(web::Data::new(token_issuer))
            .app_data(web::Data::new(options))
            .app_data(web::Data::new(adapters.clone()))
            .app_data(web::Data::new(config.manual_defaults.clone()))
            .app_data(web::Data::new(notifier.clone()));
        // Routes that require a verified identity.
        let api_scope = web::scope("/api")
            .service(routes::new_position)
            .service(routes::my_positions)
            .service(routes::position_by_id)
            .service(routes::submit_proof)
            .service(routes::request_withdrawal)
            .service(routes::my_account)
            .service(routes::my_history)
            .service(routes::my_withdrawals)
            .service(routes::notifications_stream)
            .service(routes::pending_positions)
            .service(routes::compose_instructions)
            .service(routes::approve_position)
            .service(routes::reject_position);
        // Signed processor callbacks. Each processor signs with its own secret, so each gets its
        // own middleware instance; a failed check never reaches the reconciliation engine.
        let card_scope = web::scope("/wh/card")
            .wrap(WebhookHmacFactory::new(config.card_webhook_secret.clone(), config.webhook_hmac_checks))
            .route("", web::post().to(webhook_routes::card_webhook));
        let wallet_scope = web::scope("/wh/wallet")
            .wrap(WebhookHmacFactory::new(config.wallet_webhook_secret.clone(), config.webhook_hmac_checks))
            .route("", web::post().to(webhook_routes::wallet_webhook));
        app.service(routes::health).service(api_scope).service(card_scope).service(wallet_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    info!("🚀️ Server instance created");
    Ok(srv)
}
