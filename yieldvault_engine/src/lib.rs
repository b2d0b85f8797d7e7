//! YieldVault Engine
//!
//! The YieldVault engine tracks user capital placed into time-boxed investment positions, computes
//! their accruing value, and reconciles payment confirmations from four independent channels into
//! a single authoritative ledger state. This library contains the core logic; it is
//! HTTP-framework and processor agnostic.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). You should never need to access the
//!    database directly; use the public API instead. The exception is the data types, which are
//!    defined in the [`mod@db_types`] module and are public.
//! 2. The engine public API ([`mod@api`]): the position flow API (reconciliation, approvals,
//!    withdrawals, the valuation batch) and the account query API. Backends implement the traits
//!    in [`mod@traits`] to plug in.
//! 3. Domain arithmetic: the return model ([`mod@returns`]) and the valuation ledger
//!    ([`mod@valuation`]), both pure and fully deterministic under test.
//!
//! The engine also emits events when positions change status or payment instructions become
//! available. A simple actor framework ([`mod@events`]) lets callers hook into these events —
//! the server uses it to feed the per-user push channel.
pub mod adapters;
pub mod api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod returns;
pub mod traits;
pub mod valuation;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(all(feature = "sqlite", any(feature = "test_utils", test)))]
pub mod test_utils;

pub use api::{position_objects, AccountApi, PositionFlowApi};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{AccountApiError, AccountManagement, LedgerDatabase, LedgerError};
