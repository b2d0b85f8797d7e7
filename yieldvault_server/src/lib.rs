//! # YieldVault server
//!
//! The HTTP surface of the YieldVault investment gateway. It is responsible for:
//! * authenticated user routes for opening positions, submitting payment proofs, requesting
//!   withdrawals, and the pull/refresh views over positions, history, and account totals;
//! * signed webhook callbacks from the card and wallet processors;
//! * admin routes for composing payment instructions and approving or rejecting manual payments;
//! * the per-user server-sent-event notification feed;
//! * the background valuation/expiry worker.
//!
//! ## Configuration
//! The server is configured via `YV_*` environment variables. See [config](config/index.html).
pub mod auth;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod push;
pub mod routes;
pub mod server;
pub mod valuation_worker;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
