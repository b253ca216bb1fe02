use crate::error::ExecutorError;
use core_types::Position;
use database::{LedgerRepository, MarkUpdate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The mark-to-market snapshot of one portfolio at a set of prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub portfolio_id: Uuid,
    pub cash: Decimal,
    /// Open positions with refreshed marks and unrealized PnL.
    pub positions: Vec<Position>,
    /// Cash plus the mark value of all open positions.
    pub portfolio_value: Decimal,
    /// Σ(trade PnL) over the full history: the audit definition, not the
    /// per-position accumulators.
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_pnl: Decimal,
}

/// Recomputes unrealized PnL and portfolio value from current prices.
///
/// Valuation is read-mostly: it persists refreshed marks so dashboards see
/// them, but it never mutates cash, realized PnL, or position quantities.
/// Calling it repeatedly with unchanged prices is idempotent.
#[derive(Debug, Clone)]
pub struct ValuationService {
    repository: LedgerRepository,
}

impl ValuationService {
    pub fn new(repository: LedgerRepository) -> Self {
        Self { repository }
    }

    /// Values one portfolio against the supplied price map. Symbols missing
    /// from the map fall back to the position's last recorded mark price.
    pub async fn valuate(
        &self,
        portfolio_id: Uuid,
        price_by_symbol: &HashMap<String, Decimal>,
    ) -> Result<PortfolioValuation, ExecutorError> {
        let portfolio = self.repository.get_portfolio(portfolio_id).await?;
        let mut positions = self.repository.list_positions(portfolio_id).await?;

        let mut marks = Vec::with_capacity(positions.len());
        let mut mark_value = Decimal::ZERO;
        let mut unrealized_total = Decimal::ZERO;

        for position in &mut positions {
            let mark = price_by_symbol
                .get(&position.symbol)
                .copied()
                .unwrap_or(position.current_price);

            position.current_price = mark;
            position.unrealized_pnl = position.unrealized_at(mark);

            mark_value += position.quantity * mark;
            unrealized_total += position.unrealized_pnl;
            marks.push(MarkUpdate {
                position_id: position.position_id,
                current_price: mark,
                unrealized_pnl: position.unrealized_pnl,
            });
        }

        // Observability write only; quantity, realized PnL, and balance are
        // untouched by design of `persist_marks`.
        self.repository.persist_marks(&marks).await?;

        let (realized_pnl, _fees) = self.repository.sum_trade_totals(portfolio_id).await?;

        Ok(PortfolioValuation {
            portfolio_id,
            cash: portfolio.balance,
            portfolio_value: portfolio.balance + mark_value,
            realized_pnl,
            unrealized_pnl: unrealized_total,
            total_pnl: realized_pnl + unrealized_total,
            positions,
        })
    }
}
