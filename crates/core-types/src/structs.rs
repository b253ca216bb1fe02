use crate::enums::{
    DecisionAction, MarginMode, OrderSide, OrderStatus, OrderType, PositionSide,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The account of a single competing agent: one row per (competition, agent).
///
/// `balance` moves only when a fill realizes PnL or charges a fee; valuation
/// never touches it. The ledger guarantees
/// `balance == initial_balance + Σ(trade.pnl) − Σ(trade.fee)` at all times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub portfolio_id: Uuid,
    pub name: String,
    pub initial_balance: Decimal,
    pub balance: Decimal,
    pub currency: String,
    pub leverage: Decimal,
    pub margin_mode: MarginMode,
    /// Fee charged on every fill as a fraction of notional (e.g. 0.001 = 0.1%).
    pub fee_rate: Decimal,
    pub created_at: DateTime<Utc>,
}

/// An open exposure on one symbol and side.
///
/// Quantity is strictly positive while the row exists; a fill that drives it
/// to zero deletes the row in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub position_id: Uuid,
    pub portfolio_id: Uuid,
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: Decimal,
    /// Quantity-weighted average entry price across all adds.
    pub entry_price: Decimal,
    /// Last mark price used to value this position.
    pub current_price: Decimal,
    /// Mark-to-market PnL, refreshed by valuation. Derived, never summed into cash.
    pub unrealized_pnl: Decimal,
    /// PnL realized by reductions of this position instance.
    pub realized_pnl: Decimal,
    pub leverage: Decimal,
    pub liquidation_price: Option<Decimal>,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Mark-to-market PnL of this position at the given price.
    pub fn unrealized_at(&self, mark_price: Decimal) -> Decimal {
        match self.side {
            PositionSide::Long => (mark_price - self.entry_price) * self.quantity,
            PositionSide::Short => (self.entry_price - mark_price) * self.quantity,
        }
    }
}

/// A placement request that has been validated and persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub portfolio_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub filled_quantity: Decimal,
    /// Volume-weighted average price across all fills so far.
    pub avg_price: Option<Decimal>,
    pub status: OrderStatus,
    pub reduce_only: bool,
    pub created_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// The quantity still outstanding; this is what a fill defaults to.
    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity - self.filled_quantity
    }
}

/// An immutable execution record, one per fill event.
///
/// Trades are append-only and are the audit source of truth for realized PnL
/// and fee totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: Uuid,
    pub portfolio_id: Uuid,
    pub order_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub fee: Decimal,
    /// Realized PnL attributable to this fill; zero when the fill only opened
    /// or added exposure.
    pub pnl: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// The bookkeeping fields a fill writes back onto its order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub order_id: Uuid,
    pub filled_quantity: Decimal,
    pub avg_price: Decimal,
    pub status: OrderStatus,
    pub filled_at: DateTime<Utc>,
}

/// The complete, pre-computed outcome of one fill.
///
/// The netting function produces this from in-memory copies of the affected
/// rows; the storage layer commits it in a single transaction. Splitting the
/// computation from the commit keeps the netting algorithm unit-testable
/// without a live store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillEffect {
    pub portfolio_id: Uuid,
    pub trade: Trade,
    /// Applied to the portfolio's cash balance: realized PnL minus fee.
    pub balance_delta: Decimal,
    /// Position rows to insert or overwrite.
    pub position_upserts: Vec<Position>,
    /// Position rows fully closed by this fill.
    pub position_deletes: Vec<Uuid>,
    pub order_update: OrderUpdate,
}

/// A trading decision handed down by the upstream decision collaborator.
///
/// `confidence` and `reasoning` pass through for audit logging only; they
/// never affect ledger arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    pub symbol: String,
    /// Requested quantity: a hint the adapter may clamp, not a guarantee.
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub confidence: Option<Decimal>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// One tick of market data from the upstream price-feed collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    #[serde(default)]
    pub high_24h: Option<Decimal>,
    #[serde(default)]
    pub low_24h: Option<Decimal>,
    #[serde(default)]
    pub volume_24h: Option<Decimal>,
}

/// Terminal status of a decision-execution call. There is no partial-success
/// state: a clamp to zero is a rejection, not a partial fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Executed,
    Rejected,
}

/// The typed result every decision-execution call returns; the ledger never
/// surfaces failures as panics or uncaught errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub action: DecisionAction,
    pub symbol: String,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    /// Cash spent on a buy fill, including the fee.
    pub cost: Option<Decimal>,
    /// Cash received on a sell fill, net of the fee.
    pub proceeds: Option<Decimal>,
    pub pnl: Option<Decimal>,
    pub reason: Option<String>,
}

impl ExecutionResult {
    /// A successful execution built from the resulting trade.
    pub fn executed(action: DecisionAction, trade: &Trade) -> Self {
        let notional = trade.price * trade.quantity;
        let (cost, proceeds) = match trade.side {
            OrderSide::Buy => (Some(notional + trade.fee), None),
            OrderSide::Sell => (None, Some(notional - trade.fee)),
        };
        Self {
            status: ExecutionStatus::Executed,
            action,
            symbol: trade.symbol.clone(),
            quantity: trade.quantity,
            price: Some(trade.price),
            cost,
            proceeds,
            pnl: Some(trade.pnl),
            reason: None,
        }
    }

    /// A rejection carrying a human-readable reason; nothing was written.
    pub fn rejected(action: DecisionAction, symbol: &str, reason: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Rejected,
            action,
            symbol: symbol.to_string(),
            quantity: Decimal::ZERO,
            price: None,
            cost: None,
            proceeds: None,
            pnl: None,
            reason: Some(reason.into()),
        }
    }

    /// The immediate zero-quantity success a hold decision produces.
    pub fn held(symbol: &str) -> Self {
        Self {
            status: ExecutionStatus::Executed,
            action: DecisionAction::Hold,
            symbol: symbol.to_string(),
            quantity: Decimal::ZERO,
            price: None,
            cost: None,
            proceeds: None,
            pnl: None,
            reason: None,
        }
    }
}
