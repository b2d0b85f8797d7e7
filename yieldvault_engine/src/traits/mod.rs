//! Interface contracts for the engine's database backends.
//!
//! * [`LedgerDatabase`] defines the mutating flows a backend must support: position insertion and
//!   activation, compare-and-swap valuation updates, withdrawal creation, and the idempotent
//!   bookkeeping around ledger events.
//! * [`AccountManagement`] provides the read side: account summaries, position and event queries
//!   for the pull/refresh endpoints.
//!
//! All low-level mutations are specified to be atomic per call so that a position, its ledger
//! event, and the owner totals can never disagree.
mod account_management;
mod data_objects;
mod ledger_database;

pub use account_management::{AccountApiError, AccountManagement};
pub use data_objects::{RevaluationSummary, WithdrawalOutcome};
pub use ledger_database::{LedgerDatabase, LedgerError};
