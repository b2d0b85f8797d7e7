//! Webhook signature middleware.
//!
//! Each payment processor signs the raw body of its callbacks with HMAC-SHA256 under a shared
//! secret and sends the result in the `X-Signature-HMAC-SHA256` header. Wrap a webhook scope with
//! this middleware and an unsigned or mis-signed request never reaches the handler — and therefore
//! never reaches the reconciliation engine.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorForbidden},
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use yv_common::Secret;

use crate::helpers::calculate_hmac;

pub const SIGNATURE_HEADER: &str = "X-Signature-HMAC-SHA256";

pub struct WebhookHmacFactory {
    key: Secret<String>,
    // If false, the middleware lets every call through unchecked (local development only).
    enabled: bool,
}

impl WebhookHmacFactory {
    pub fn new(key: Secret<String>, enabled: bool) -> Self {
        WebhookHmacFactory { key, enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for WebhookHmacFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = WebhookHmacService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WebhookHmacService { key: self.key.clone(), enabled: self.enabled, service: Rc::new(service) }))
    }
}

pub struct WebhookHmacService<S> {
    key: Secret<String>,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for WebhookHmacService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.key.reveal().clone();
        let enabled = self.enabled;
        Box::pin(async move {
            trace!("🔐️ Checking webhook signature");
            if !enabled {
                trace!("🔐️ Webhook signature checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract webhook body: {:?}", e);
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let expected = calculate_hmac(&secret, data.as_ref());
            let provided = req.headers().get(SIGNATURE_HEADER).ok_or_else(|| {
                warn!("🔐️ No signature found in webhook request. Denying access.");
                ErrorForbidden("No signature found.")
            })?;
            if provided == expected.as_str() {
                trace!("🔐️ Webhook signature check ✅️");
                req.set_payload(bytes_to_payload(data));
                service.call(req).await
            } else {
                warn!("🔐️ Invalid signature on webhook request. Denying access.");
                Err(ErrorForbidden("Invalid signature."))
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
