//! Core data types shared between the engine API and the database backends.
//!
//! Everything here is persisted, so the enum variants double as the canonical string
//! representations stored in the `status`/`kind`/`channel` columns. Keep `Display`, `FromStr` and
//! the sqlx `Type` derives in sync when adding variants.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
use yv_common::UsdCents;

#[derive(Debug, Clone, Error)]
#[error("Invalid {0}: {1}")]
pub struct ConversionError(pub &'static str, pub String);

//--------------------------------------      UserId        ----------------------------------------------------------
/// The verified identity of a user, as issued by the external auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct UserId(pub String);

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for UserId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      Category      ----------------------------------------------------------
/// The asset class a position is invested in. The category only influences the valuation jitter
/// amplitude, expressed here in basis points of the accrued amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum Category {
    Stocks,
    RealEstate,
    Forex,
    Crypto,
}

impl Category {
    /// The documented per-category jitter bound, in basis points (±).
    pub fn jitter_bound_bps(&self) -> i64 {
        match self {
            Category::Stocks => 100,
            Category::RealEstate => 200,
            Category::Forex => 300,
            Category::Crypto => 500,
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Stocks => write!(f, "Stocks"),
            Category::RealEstate => write!(f, "RealEstate"),
            Category::Forex => write!(f, "Forex"),
            Category::Crypto => write!(f, "Crypto"),
        }
    }
}

impl FromStr for Category {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Stocks" => Ok(Self::Stocks),
            "RealEstate" => Ok(Self::RealEstate),
            "Forex" => Ok(Self::Forex),
            "Crypto" => Ok(Self::Crypto),
            s => Err(ConversionError("category", s.to_string())),
        }
    }
}

//--------------------------------------        Tier        ----------------------------------------------------------
/// A named return bracket. The annual rate table is fixed; rates are never user-settable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum Tier {
    Starter,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    /// Annual midpoint rate for the tier, in whole percent.
    pub fn annual_rate_pct(&self) -> i64 {
        match self {
            Tier::Starter => 15,
            Tier::Silver => 22,
            Tier::Gold => 30,
            Tier::Platinum => 40,
        }
    }
}

impl Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Starter => write!(f, "Starter"),
            Tier::Silver => write!(f, "Silver"),
            Tier::Gold => write!(f, "Gold"),
            Tier::Platinum => write!(f, "Platinum"),
        }
    }
}

impl FromStr for Tier {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Starter" => Ok(Self::Starter),
            "Silver" => Ok(Self::Silver),
            "Gold" => Ok(Self::Gold),
            "Platinum" => Ok(Self::Platinum),
            s => Err(ConversionError("tier", s.to_string())),
        }
    }
}

//--------------------------------------   PositionStatus   ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PositionStatus {
    /// Awaiting payment confirmation (manual channels) or never yet confirmed.
    Pending,
    /// Payment reconciled; the position accrues value until maturity.
    Active,
    /// Reached maturity and settled at principal + expected payout.
    Completed,
    /// Capital returned to the user via a withdrawal request.
    Withdrawn,
    /// Denied by an admin, or expired while awaiting payment.
    Rejected,
}

impl PositionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Withdrawn | Self::Rejected)
    }

    /// The position state machine. `Pending → Active → {Completed, Withdrawn}`,
    /// `Pending → Rejected`; terminal states have no exits.
    pub fn can_transition_to(&self, next: PositionStatus) -> bool {
        use PositionStatus::*;
        match (self, next) {
            (Pending, Active) | (Pending, Rejected) => true,
            (Active, Completed) | (Active, Withdrawn) => true,
            (_, _) => false,
        }
    }
}

impl Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionStatus::Pending => write!(f, "Pending"),
            PositionStatus::Active => write!(f, "Active"),
            PositionStatus::Completed => write!(f, "Completed"),
            PositionStatus::Withdrawn => write!(f, "Withdrawn"),
            PositionStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

impl FromStr for PositionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Active" => Ok(Self::Active),
            "Completed" => Ok(Self::Completed),
            "Withdrawn" => Ok(Self::Withdrawn),
            "Rejected" => Ok(Self::Rejected),
            s => Err(ConversionError("position status", s.to_string())),
        }
    }
}

//--------------------------------------   PaymentChannel   ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentChannel {
    Card,
    Wallet,
    Crypto,
    Wire,
}

impl PaymentChannel {
    /// Instant channels confirm via a signed processor callback; manual channels require
    /// user-submitted proof and admin approval.
    pub fn is_instant(&self) -> bool {
        matches!(self, Self::Card | Self::Wallet)
    }
}

impl Display for PaymentChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentChannel::Card => write!(f, "Card"),
            PaymentChannel::Wallet => write!(f, "Wallet"),
            PaymentChannel::Crypto => write!(f, "Crypto"),
            PaymentChannel::Wire => write!(f, "Wire"),
        }
    }
}

impl FromStr for PaymentChannel {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Card" => Ok(Self::Card),
            "Wallet" => Ok(Self::Wallet),
            "Crypto" => Ok(Self::Crypto),
            "Wire" => Ok(Self::Wire),
            s => Err(ConversionError("payment channel", s.to_string())),
        }
    }
}

//--------------------------------------    PaymentState    ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentState {
    AwaitingPayment,
    Confirmed,
    Failed,
}

impl Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentState::AwaitingPayment => write!(f, "AwaitingPayment"),
            PaymentState::Confirmed => write!(f, "Confirmed"),
            PaymentState::Failed => write!(f, "Failed"),
        }
    }
}

//--------------------------------------      Position      ----------------------------------------------------------
/// A single investment commitment. Mutated only by the reconciliation engine and the valuation
/// scheduler; every mutation is a compare-and-swap on `(id, version)`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Position {
    pub id: i64,
    pub user_id: UserId,
    pub category: Category,
    pub tier: Tier,
    pub principal: UsdCents,
    pub duration_weeks: i64,
    pub annual_rate_pct: i64,
    pub expected_payout: UsdCents,
    pub current_value: UsdCents,
    pub per_period_accrual: UsdCents,
    pub status: PositionStatus,
    pub started_at: DateTime<Utc>,
    pub matures_at: DateTime<Utc>,
    pub last_valued_at: DateTime<Utc>,
    pub payment_channel: PaymentChannel,
    pub payment_state: PaymentState,
    pub external_reference: Option<String>,
    /// Admin-composed payment instructions, serialized as JSON. Only set on manual channels.
    pub instructions: Option<String>,
    pub auto_reinvest: bool,
    /// Optimistic-lock counter. A stale write affects zero rows and is retried.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// One sub-period is one day of linear accrual.
    pub fn total_sub_periods(&self) -> i64 {
        self.duration_weeks * 7
    }

    pub fn value_at_maturity(&self) -> UsdCents {
        self.principal + self.expected_payout
    }
}

//--------------------------------------    NewPosition     ----------------------------------------------------------
/// Field set for inserting a position. Produced by the return model's `commit` so that preview and
/// persisted values always agree.
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub user_id: UserId,
    pub category: Category,
    pub tier: Tier,
    pub principal: UsdCents,
    pub duration_weeks: i64,
    pub annual_rate_pct: i64,
    pub expected_payout: UsdCents,
    pub per_period_accrual: UsdCents,
    pub status: PositionStatus,
    pub started_at: DateTime<Utc>,
    pub matures_at: DateTime<Utc>,
    pub payment_channel: PaymentChannel,
    pub payment_state: PaymentState,
    pub external_reference: Option<String>,
    pub auto_reinvest: bool,
}

//--------------------------------------   LedgerEventKind  ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum LedgerEventKind {
    Credit,
    Debit,
    Accrual,
    Fee,
}

impl Display for LedgerEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerEventKind::Credit => write!(f, "Credit"),
            LedgerEventKind::Debit => write!(f, "Debit"),
            LedgerEventKind::Accrual => write!(f, "Accrual"),
            LedgerEventKind::Fee => write!(f, "Fee"),
        }
    }
}

//--------------------------------------  LedgerEventState  ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum LedgerEventState {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl Display for LedgerEventState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerEventState::Pending => write!(f, "Pending"),
            LedgerEventState::Completed => write!(f, "Completed"),
            LedgerEventState::Failed => write!(f, "Failed"),
            LedgerEventState::Cancelled => write!(f, "Cancelled"),
        }
    }
}

//--------------------------------------    LedgerEvent     ----------------------------------------------------------
/// Append-only audit record. Never mutated after reaching `Completed`; the external reference and
/// channel are kept verbatim so webhook replays remain forensically traceable.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub id: i64,
    pub user_id: UserId,
    pub position_id: Option<i64>,
    pub kind: LedgerEventKind,
    pub amount: UsdCents,
    pub state: LedgerEventState,
    pub channel: PaymentChannel,
    /// The processor's idempotency key, or the user-submitted proof for manual channels. NULL
    /// until a manual proof is attached; unique once set.
    pub external_reference: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLedgerEvent {
    pub user_id: UserId,
    pub position_id: Option<i64>,
    pub kind: LedgerEventKind,
    pub amount: UsdCents,
    pub state: LedgerEventState,
    pub channel: PaymentChannel,
    pub external_reference: Option<String>,
    pub note: Option<String>,
}

impl NewLedgerEvent {
    pub fn new(user_id: UserId, kind: LedgerEventKind, amount: UsdCents, channel: PaymentChannel) -> Self {
        Self {
            user_id,
            position_id: None,
            kind,
            amount,
            state: LedgerEventState::Pending,
            channel,
            external_reference: None,
            note: None,
        }
    }

    pub fn for_position(mut self, position_id: i64) -> Self {
        self.position_id = Some(position_id);
        self
    }

    pub fn with_state(mut self, state: LedgerEventState) -> Self {
        self.state = state;
        self
    }

    pub fn with_reference<S: Into<String>>(mut self, reference: S) -> Self {
        self.external_reference = Some(reference.into());
        self
    }

    pub fn with_note<S: Into<String>>(mut self, note: S) -> Self {
        self.note = Some(note.into());
        self
    }
}

//-------------------------------------- WithdrawalRequest  ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum WithdrawalMethod {
    Crypto,
    Wire,
}

impl Display for WithdrawalMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WithdrawalMethod::Crypto => write!(f, "Crypto"),
            WithdrawalMethod::Wire => write!(f, "Wire"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum WithdrawalState {
    Pending,
    Processing,
    Completed,
    Rejected,
}

impl Display for WithdrawalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WithdrawalState::Pending => write!(f, "Pending"),
            WithdrawalState::Processing => write!(f, "Processing"),
            WithdrawalState::Completed => write!(f, "Completed"),
            WithdrawalState::Rejected => write!(f, "Rejected"),
        }
    }
}

/// A request to pay out an active position. Creating one atomically flips the position to
/// `Withdrawn`; a position owns at most one open request.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: i64,
    pub user_id: UserId,
    pub position_id: i64,
    pub principal: UsdCents,
    pub profit: UsdCents,
    pub method: WithdrawalMethod,
    pub destination: String,
    pub state: WithdrawalState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWithdrawalRequest {
    pub user_id: UserId,
    pub position_id: i64,
    pub principal: UsdCents,
    pub profit: UsdCents,
    pub method: WithdrawalMethod,
    pub destination: String,
}

//--------------------------------------   AccountSummary   ----------------------------------------------------------
/// Owner running totals, incremented exactly once per accepted payment event.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AccountSummary {
    pub user_id: UserId,
    pub total_invested: UsdCents,
    pub total_earned: UsdCents,
    pub total_withdrawn: UsdCents,
    pub active_positions: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        Role        ----------------------------------------------------------
/// Access roles carried in the bearer token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError("role", s.to_string())),
        }
    }
}

//--------------------------------------  ValidationError   ----------------------------------------------------------
/// User-correctable input errors, rejected before any computation or external call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Principal {got} is below the minimum of {min}")]
    PrincipalBelowMinimum { min: UsdCents, got: UsdCents },
    #[error("Duration of {got} weeks is below the minimum of {min}")]
    DurationBelowMinimum { min: i64, got: i64 },
    #[error("Unknown tier: {0}")]
    UnknownTier(String),
    #[error("Unknown category: {0}")]
    UnknownCategory(String),
    #[error("Invalid payment amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid payment proof: {0}")]
    InvalidProof(String),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn terminal_statuses_have_no_exits() {
        use PositionStatus::*;
        for terminal in [Completed, Withdrawn, Rejected] {
            for next in [Pending, Active, Completed, Withdrawn, Rejected] {
                assert!(!terminal.can_transition_to(next), "{terminal} must not move to {next}");
            }
            assert!(terminal.is_terminal());
        }
    }

    #[test]
    fn the_live_paths_are_exactly_the_allowed_ones() {
        use PositionStatus::*;
        assert!(Pending.can_transition_to(Active));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Withdrawn));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Active.can_transition_to(Rejected));
        assert!(!Active.can_transition_to(Pending));
    }

    #[test]
    fn enum_round_trips_match_their_storage_strings() {
        for status in ["Pending", "Active", "Completed", "Withdrawn", "Rejected"] {
            assert_eq!(status.parse::<PositionStatus>().unwrap().to_string(), status);
        }
        for channel in ["Card", "Wallet", "Crypto", "Wire"] {
            assert_eq!(channel.parse::<PaymentChannel>().unwrap().to_string(), channel);
        }
        for tier in ["Starter", "Silver", "Gold", "Platinum"] {
            assert_eq!(tier.parse::<Tier>().unwrap().to_string(), tier);
        }
        assert!("Diamond".parse::<Tier>().is_err());
    }
}
