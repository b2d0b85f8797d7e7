use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use yv_common::USD_CURRENCY_CODE;

use crate::{
    config::ProcessorConfig,
    data_objects::{ChargeHandle, NewChargeRequest, RemoteCharge},
    ProcessorApiError,
};

/// A thin client over a payment processor's charge API.
#[derive(Clone)]
pub struct ProcessorApi {
    config: ProcessorConfig,
    client: Arc<Client>,
}

impl ProcessorApi {
    pub fn new(config: ProcessorConfig) -> Result<Self, ProcessorApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(&format!("Bearer {}", config.api_key.reveal()))
            .map_err(|e| ProcessorApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProcessorApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Create a new charge at the processor. Only a correlation handle comes back; the business
    /// outcome arrives later on the signed webhook.
    pub async fn create_charge(&self, request: &NewChargeRequest) -> Result<ChargeHandle, ProcessorApiError> {
        if !request.amount.is_positive() {
            return Err(ProcessorApiError::InvalidCurrencyAmount(format!(
                "Charge amount must be positive, got {}",
                request.amount
            )));
        }
        if request.currency != USD_CURRENCY_CODE {
            return Err(ProcessorApiError::InvalidCurrencyAmount(format!(
                "Only {USD_CURRENCY_CODE} is supported, got {}",
                request.currency
            )));
        }
        let handle: ChargeHandle = self.rest_query(Method::POST, "/v1/charges", Some(request)).await?;
        debug!("💳️ New {} charge created. ref: {}", self.config.name, handle.reference);
        Ok(handle)
    }

    /// Look up an existing charge by its correlation reference.
    pub async fn fetch_charge(&self, reference: &str) -> Result<RemoteCharge, ProcessorApiError> {
        let path = format!("/v1/charges/{reference}");
        self.rest_query::<RemoteCharge, ()>(Method::GET, &path, None).await
    }

    async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, ProcessorApiError> {
        let url = format!("{}{path}", self.config.base_url);
        trace!("💳️ Sending {} REST query: {url}", self.config.name);
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                ProcessorApiError::Unreachable(e.to_string())
            } else {
                ProcessorApiError::RestResponseError(e.to_string())
            }
        })?;
        if response.status().is_success() {
            trace!("💳️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| ProcessorApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| ProcessorApiError::RestResponseError(e.to_string()))?;
            Err(ProcessorApiError::QueryError { status, message })
        }
    }
}
