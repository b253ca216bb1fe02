use crate::error::EngineError;
use configuration::ExecutionPolicy;
use core_types::{
    Decision, DecisionAction, ExecutionResult, MarketSnapshot, OrderSide, OrderType, PositionSide,
};
use executor::{ExecutionEngine, ExecutorError, OrderRequest};
use rust_decimal::Decimal;
use uuid::Uuid;

/// The reason reported whenever clamping leaves nothing to execute.
const NO_FUNDS_REASON: &str = "insufficient funds or no position";

/// Translates upstream trading decisions into concrete, funds-checked market
/// orders and executes them immediately against the snapshot's quote.
///
/// A call moves through `Received → Clamped → {Rejected | Placed → Filled →
/// Reported}`; there is no partial-success state, and a clamp to zero is a
/// rejection rather than a partial fill.
#[derive(Debug, Clone)]
pub struct DecisionAdapter {
    engine: ExecutionEngine,
    policy: ExecutionPolicy,
}

impl DecisionAdapter {
    pub fn new(engine: ExecutionEngine, policy: ExecutionPolicy) -> Self {
        Self { engine, policy }
    }

    /// Executes one decision for one portfolio.
    ///
    /// A missing or malformed decision or snapshot degrades to a hold: the
    /// upstream collaborators are allowed to fail without poisoning the
    /// ledger. Confidence and reasoning are logged for audit only.
    pub async fn execute(
        &self,
        portfolio_id: Uuid,
        decision: Option<&Decision>,
        snapshot: Option<&MarketSnapshot>,
    ) -> Result<ExecutionResult, EngineError> {
        let Some(decision) = decision else {
            tracing::warn!(%portfolio_id, "Missing decision; defaulting to hold");
            return Ok(ExecutionResult::held("UNKNOWN"));
        };

        tracing::info!(
            %portfolio_id,
            action = %decision.action,
            symbol = %decision.symbol,
            confidence = ?decision.confidence,
            reasoning = decision.reasoning.as_deref().unwrap_or(""),
            "Received decision"
        );

        if decision.action == DecisionAction::Hold {
            return Ok(ExecutionResult::held(&decision.symbol));
        }

        let Some(snapshot) = valid_snapshot(snapshot, &decision.symbol) else {
            tracing::warn!(%portfolio_id, symbol = %decision.symbol, "Missing or invalid snapshot; defaulting to hold");
            return Ok(ExecutionResult::held(&decision.symbol));
        };

        match decision.action {
            DecisionAction::Buy => self.execute_buy(portfolio_id, decision, snapshot).await,
            DecisionAction::Sell | DecisionAction::Short => {
                self.execute_sell(portfolio_id, decision, snapshot).await
            }
            DecisionAction::Hold => Ok(ExecutionResult::held(&decision.symbol)),
        }
    }

    /// Buys at the ask, never committing more than the policy's share of cash.
    async fn execute_buy(
        &self,
        portfolio_id: Uuid,
        decision: &Decision,
        snapshot: &MarketSnapshot,
    ) -> Result<ExecutionResult, EngineError> {
        let portfolio = match self.engine.repository().get_portfolio(portfolio_id).await {
            Ok(p) => p,
            Err(database::StorageError::NotFound(what)) => {
                return Ok(ExecutionResult::rejected(
                    decision.action,
                    &decision.symbol,
                    format!("unknown {what}"),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        let price = snapshot.ask;
        // The most the policy allows this order to spend, fees included.
        let affordable = self.policy.cash_utilization * portfolio.balance
            / (price * (Decimal::ONE + portfolio.fee_rate));
        let quantity = clamp_quantity(decision.quantity, affordable);

        if quantity <= Decimal::ZERO {
            return Ok(ExecutionResult::rejected(
                decision.action,
                &decision.symbol,
                NO_FUNDS_REASON,
            ));
        }

        self.place_and_fill(portfolio_id, decision, OrderSide::Buy, quantity, price, false)
            .await
    }

    /// Sells at the bid: a closing sell when a long covers it, otherwise a
    /// short open clamped by the margin-requirement policy.
    async fn execute_sell(
        &self,
        portfolio_id: Uuid,
        decision: &Decision,
        snapshot: &MarketSnapshot,
    ) -> Result<ExecutionResult, EngineError> {
        let price = snapshot.bid;
        let long = self
            .engine
            .repository()
            .get_position(portfolio_id, &decision.symbol, PositionSide::Long)
            .await?;

        // A sell the long fully covers closes it; a larger request falls
        // through to the short path so the fill can flip the position.
        if let Some(long) = long.filter(|p| p.quantity > Decimal::ZERO) {
            if decision.quantity.is_none_or(|q| q <= long.quantity) {
                let quantity = clamp_quantity(decision.quantity, long.quantity);
                if quantity <= Decimal::ZERO {
                    return Ok(ExecutionResult::rejected(
                        decision.action,
                        &decision.symbol,
                        NO_FUNDS_REASON,
                    ));
                }
                return self
                    .place_and_fill(portfolio_id, decision, OrderSide::Sell, quantity, price, true)
                    .await;
            }
        }

        let portfolio = match self.engine.repository().get_portfolio(portfolio_id).await {
            Ok(p) => p,
            Err(database::StorageError::NotFound(what)) => {
                return Ok(ExecutionResult::rejected(
                    decision.action,
                    &decision.symbol,
                    format!("unknown {what}"),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        // Opening a short: margin requirement against the policy's cash share.
        let affordable = self.policy.cash_utilization * portfolio.balance
            / (price * self.policy.short_margin_requirement);
        let quantity = clamp_quantity(decision.quantity, affordable);

        if quantity <= Decimal::ZERO {
            return Ok(ExecutionResult::rejected(
                decision.action,
                &decision.symbol,
                NO_FUNDS_REASON,
            ));
        }

        self.place_and_fill(portfolio_id, decision, OrderSide::Sell, quantity, price, false)
            .await
    }

    /// Places a market order and fills it at the chosen price; the engine
    /// commits both as one transaction, so there are no resting orders on
    /// the decision path.
    async fn place_and_fill(
        &self,
        portfolio_id: Uuid,
        decision: &Decision,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
        reduce_only: bool,
    ) -> Result<ExecutionResult, EngineError> {
        let filled = self
            .engine
            .place_and_fill(
                OrderRequest {
                    portfolio_id,
                    symbol: decision.symbol.clone(),
                    side,
                    order_type: OrderType::Market,
                    quantity,
                    price: Some(price),
                    stop_price: None,
                    reduce_only,
                },
                price,
            )
            .await;

        match filled {
            Ok(trade) => {
                tracing::info!(
                    %portfolio_id,
                    symbol = %trade.symbol,
                    quantity = %trade.quantity,
                    price = %trade.price,
                    pnl = %trade.pnl,
                    "Executed decision"
                );
                Ok(ExecutionResult::executed(decision.action, &trade))
            }
            Err(e) => reject_or_fail(decision, e),
        }
    }

    /// Deletes a portfolio's trades, orders, and positions and restores its
    /// starting balance. Safe to repeat.
    pub async fn reset(&self, portfolio_id: Uuid) -> Result<(), EngineError> {
        self.engine.repository().reset_portfolio(portfolio_id).await?;
        Ok(())
    }
}

/// A snapshot is usable when it matches the decided symbol and quotes both
/// sides at positive prices.
fn valid_snapshot<'a>(
    snapshot: Option<&'a MarketSnapshot>,
    symbol: &str,
) -> Option<&'a MarketSnapshot> {
    snapshot.filter(|s| {
        s.symbol == symbol && s.bid > Decimal::ZERO && s.ask > Decimal::ZERO && s.bid <= s.ask
    })
}

/// The requested quantity is a hint; an absent hint asks for the maximum the
/// policy allows. Clamped results are trimmed to eight decimal places so the
/// division cannot smear precision across the ledger.
fn clamp_quantity(requested: Option<Decimal>, ceiling: Decimal) -> Decimal {
    requested.unwrap_or(ceiling).min(ceiling).round_dp(8)
}

fn reject_or_fail(
    decision: &Decision,
    error: ExecutorError,
) -> Result<ExecutionResult, EngineError> {
    match error.rejection_reason() {
        Some(reason) => Ok(ExecutionResult::rejected(
            decision.action,
            &decision.symbol,
            reason,
        )),
        None => Err(error.into()),
    }
}
