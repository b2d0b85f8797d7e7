//! The engine's public-facing API surface.
//!
//! [`PositionFlowApi`] owns every flow that mutates ledger state: payment reconciliation,
//! manual-channel submission and approval, withdrawals, and the scheduler's valuation batch.
//! [`AccountApi`] is the read side backing the pull/refresh endpoints.
pub mod accounts_api;
pub mod position_flow_api;
pub mod position_objects;

pub use accounts_api::AccountApi;
pub use position_flow_api::PositionFlowApi;
