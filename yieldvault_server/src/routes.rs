//! Request handler definitions.
//!
//! Handlers stay thin: authentication happens in the [`AuthClaims`] extractor, business rules in
//! the engine's flow API, and anything longer than a few lines belongs in a module of its own.
//! Every piece of state a handler can push to a client is also reachable here via a pull route,
//! so a missed notification is never fatal.
use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use log::*;
use yieldvault_engine::{
    adapters::{ChargeRequest, EventMetadata, InstantAdapter, ManualChannelDefaults, PaymentInstructions},
    db_types::PaymentChannel,
    position_objects::{NewPositionRequest, PaymentProof},
    returns,
    AccountApi,
    PositionFlowApi,
    SqliteDatabase,
};

use crate::{
    auth::AuthClaims,
    config::ServerOptions,
    data_objects::{InstantChargeResponse, JsonResponse, ManualPositionResponse, RejectParams, WithdrawalParams},
    errors::ServerError,
    integrations::processors::InstantAdapters,
    push::{sse_response, PushNotifier},
};

type FlowApi = web::Data<PositionFlowApi<SqliteDatabase>>;
type AccountsApi = web::Data<AccountApi<SqliteDatabase>>;

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(JsonResponse::success("👍️"))
}

//--------------------------------------    User routes     ----------------------------------------------------------

/// Open a new position. Instant channels come back with a charge handle to complete payment
/// against; the position itself is created by the processor's signed callback. Manual channels
/// come back as a pending position plus payment instructions.
#[post("/positions")]
pub async fn new_position(
    claims: AuthClaims,
    body: web::Json<NewPositionRequest>,
    flow: FlowApi,
    adapters: web::Data<InstantAdapters>,
    defaults: web::Data<ManualChannelDefaults>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    if request.channel.is_instant() {
        // Validate before any external call; a bad principal never reaches the processor.
        let preview = returns::preview(request.tier, request.principal, request.duration_weeks, Utc::now())?;
        let charge = ChargeRequest {
            amount: request.principal,
            metadata: EventMetadata {
                user_id: claims.user_id.clone(),
                category: request.category.to_string(),
                tier: request.tier.to_string(),
                duration_weeks: request.duration_weeks,
                auto_reinvest: request.auto_reinvest,
            },
        };
        let handle = match request.channel {
            PaymentChannel::Card => adapters.card.create_charge(&charge).await?,
            PaymentChannel::Wallet => adapters.wallet.create_charge(&charge).await?,
            other => return Err(ServerError::InvalidInput(format!("{other} is not an instant channel"))),
        };
        debug!("💼️ Charge [{}] created for {}", handle.reference, claims.user_id);
        Ok(HttpResponse::Ok().json(InstantChargeResponse { handle, preview }))
    } else {
        let (position, instructions) =
            flow.submit_manual_position(claims.user_id.clone(), &request, &defaults).await?;
        Ok(HttpResponse::Created().json(ManualPositionResponse { position, instructions }))
    }
}

/// The pull/refresh path: everything the push channel could have told the user, recoverable.
#[get("/positions")]
pub async fn my_positions(claims: AuthClaims, accounts: AccountsApi) -> Result<HttpResponse, ServerError> {
    let positions = accounts.positions_for_user(&claims.user_id).await?;
    Ok(HttpResponse::Ok().json(positions))
}

#[get("/positions/{id}")]
pub async fn position_by_id(
    claims: AuthClaims,
    path: web::Path<i64>,
    accounts: AccountsApi,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let position = accounts
        .position_for_user(&claims.user_id, id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Position #{id}")))?;
    Ok(HttpResponse::Ok().json(position))
}

#[post("/positions/{id}/proof")]
pub async fn submit_proof(
    claims: AuthClaims,
    path: web::Path<i64>,
    body: web::Json<PaymentProof>,
    flow: FlowApi,
) -> Result<HttpResponse, ServerError> {
    let position = flow.attach_payment_proof(&claims.user_id, path.into_inner(), &body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(position))
}

#[post("/positions/{id}/withdraw")]
pub async fn request_withdrawal(
    claims: AuthClaims,
    path: web::Path<i64>,
    body: web::Json<WithdrawalParams>,
    flow: FlowApi,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    let outcome = flow
        .request_withdrawal(
            &claims.user_id,
            path.into_inner(),
            params.method,
            params.destination,
            options.holding_window,
            options.withdrawal_fee_bps,
        )
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[get("/account")]
pub async fn my_account(claims: AuthClaims, accounts: AccountsApi) -> Result<HttpResponse, ServerError> {
    let summary = accounts.account(&claims.user_id).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[get("/history")]
pub async fn my_history(claims: AuthClaims, accounts: AccountsApi) -> Result<HttpResponse, ServerError> {
    let events = accounts.history_for_user(&claims.user_id).await?;
    Ok(HttpResponse::Ok().json(events))
}

#[get("/withdrawals")]
pub async fn my_withdrawals(claims: AuthClaims, accounts: AccountsApi) -> Result<HttpResponse, ServerError> {
    let withdrawals = accounts.withdrawals_for_user(&claims.user_id).await?;
    Ok(HttpResponse::Ok().json(withdrawals))
}

/// The user's real-time room as a server-sent-event stream. Best-effort by design; the pull
/// routes above are the source of truth.
#[get("/notifications/stream")]
pub async fn notifications_stream(claims: AuthClaims, notifier: web::Data<PushNotifier>) -> HttpResponse {
    let rx = notifier.subscribe(&claims.user_id).await;
    trace!("📡️ {} joined their notification room", claims.user_id);
    sse_response(rx)
}

//--------------------------------------    Admin routes    ----------------------------------------------------------

#[get("/admin/positions/pending")]
pub async fn pending_positions(claims: AuthClaims, accounts: AccountsApi) -> Result<HttpResponse, ServerError> {
    claims.require_admin()?;
    let positions = accounts.pending_positions().await?;
    Ok(HttpResponse::Ok().json(positions))
}

#[post("/admin/positions/{id}/instructions")]
pub async fn compose_instructions(
    claims: AuthClaims,
    path: web::Path<i64>,
    body: web::Json<PaymentInstructions>,
    flow: FlowApi,
) -> Result<HttpResponse, ServerError> {
    claims.require_admin()?;
    let position = flow.compose_instructions(path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(position))
}

#[post("/admin/positions/{id}/approve")]
pub async fn approve_position(claims: AuthClaims, path: web::Path<i64>, flow: FlowApi) -> Result<HttpResponse, ServerError> {
    claims.require_admin()?;
    let position = flow.approve_position(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(position))
}

#[post("/admin/positions/{id}/reject")]
pub async fn reject_position(
    claims: AuthClaims,
    path: web::Path<i64>,
    body: web::Json<RejectParams>,
    flow: FlowApi,
) -> Result<HttpResponse, ServerError> {
    claims.require_admin()?;
    let params = body.into_inner();
    let position = flow.reject_position(path.into_inner(), params.reason.as_deref()).await?;
    Ok(HttpResponse::Ok().json(position))
}
