//! REST clients for the external instant-confirm payment processors.
//!
//! Two processors are supported: a card processor and a crypto-wallet processor. Both expose the
//! same minimal surface (create a charge, fetch a charge), so a single [`ProcessorApi`] client is
//! instantiated once per processor with its own [`ProcessorConfig`].
//!
//! The clients never touch the ledger. They hand back a correlation handle; the business outcome
//! arrives later on a signed webhook handled by the server.
mod api;
mod config;
mod error;

mod data_objects;

pub use api::ProcessorApi;
pub use config::ProcessorConfig;
pub use data_objects::{ChargeHandle, ChargeMetadata, ChargeState, NewChargeRequest, RemoteCharge};
pub use error::ProcessorApiError;
