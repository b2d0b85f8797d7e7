//! Inbound processor callbacks.
//!
//! The webhook middleware has already verified the body signature by the time these handlers run.
//! Per the processors' delivery contract, a 2xx acknowledges *receipt* — business failures are
//! logged, never signalled via the status code, so the sender's retry queue cannot pile up on an
//! error that retrying will not fix.
use actix_web::{web, HttpResponse};
use log::*;
use yieldvault_engine::{
    adapters::PaymentEventOutcome,
    db_types::PaymentChannel,
    PositionFlowApi,
    SqliteDatabase,
};
use yv_common::USD_CURRENCY_CODE;

use crate::{data_objects::JsonResponse, integrations::processors::ProcessorCallback};

pub async fn card_webhook(
    body: web::Json<ProcessorCallback>,
    flow: web::Data<PositionFlowApi<SqliteDatabase>>,
) -> HttpResponse {
    process_callback(PaymentChannel::Card, body.into_inner(), &flow).await
}

pub async fn wallet_webhook(
    body: web::Json<ProcessorCallback>,
    flow: web::Data<PositionFlowApi<SqliteDatabase>>,
) -> HttpResponse {
    process_callback(PaymentChannel::Wallet, body.into_inner(), &flow).await
}

async fn process_callback(
    channel: PaymentChannel,
    callback: ProcessorCallback,
    flow: &PositionFlowApi<SqliteDatabase>,
) -> HttpResponse {
    let reference = callback.reference.clone();
    if callback.currency != USD_CURRENCY_CODE {
        warn!("🪝️ {channel} callback [{reference}] in unsupported currency {}. Ignoring.", callback.currency);
        return HttpResponse::Ok().json(JsonResponse::failure("Unsupported currency"));
    }
    let event = callback.normalize(channel);
    match event.outcome {
        PaymentEventOutcome::Confirmed => match flow.apply_payment_event(event).await {
            Ok(position) => {
                info!("🪝️ {channel} payment [{reference}] reconciled into position #{}", position.id);
            },
            Err(e) => {
                // Acknowledged but not applied; an operator follows up from the logs.
                error!("🪝️ {channel} payment [{reference}] could not be reconciled: {e}");
            },
        },
        PaymentEventOutcome::Submitted => {
            debug!("🪝️ {channel} charge [{reference}] submitted; awaiting settlement");
        },
        PaymentEventOutcome::Failed => {
            warn!("🪝️ {channel} charge [{reference}] failed at the processor");
        },
    }
    HttpResponse::Ok().json(JsonResponse::success("ok"))
}
