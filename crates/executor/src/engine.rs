use crate::error::ExecutorError;
use crate::netting::{apply_fill, FillContext};
use chrono::Utc;
use core_types::{Order, OrderSide, OrderStatus, OrderType, Trade};
use database::{LedgerRepository, StorageError};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A validated placement request. Market orders carry their reference price
/// in `price` for the margin check; it doubles as the limit price for limit
/// and stop-limit types.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub portfolio_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub reduce_only: bool,
}

/// The order execution engine: validates and places orders, then fills them
/// against a supplied execution price.
///
/// The engine is a calculator over in-memory copies; every mutation goes
/// through the ledger repository as one atomic transaction. Two engines (or
/// a retried call) racing on the same portfolio serialize at that boundary.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    repository: LedgerRepository,
}

impl ExecutionEngine {
    pub fn new(repository: LedgerRepository) -> Self {
        Self { repository }
    }

    /// Validates and persists an order in `pending` status.
    ///
    /// Rejections (non-positive quantity, missing limit price, insufficient
    /// margin, reduce-only without covering exposure) happen before any store
    /// mutation, so a rejected placement leaves no Order row behind.
    pub async fn place_order(&self, request: OrderRequest) -> Result<Order, ExecutorError> {
        self.validate_placement(&request).await?;
        let order = build_order(request);
        self.repository.insert_order(&order).await?;

        tracing::debug!(
            order_id = %order.order_id,
            portfolio_id = %order.portfolio_id,
            side = %order.side,
            quantity = %order.quantity,
            "Placed order"
        );
        Ok(order)
    }

    /// Places an order and fills it in full at `fill_price`, committing the
    /// order row and the entire fill outcome as one transaction.
    ///
    /// The immediate-execution path: a failure anywhere rolls the whole call
    /// back, so no pending order survives a fill that never happened.
    pub async fn place_and_fill(
        &self,
        request: OrderRequest,
        fill_price: Decimal,
    ) -> Result<Trade, ExecutorError> {
        if fill_price <= Decimal::ZERO {
            return Err(ExecutorError::Validation(
                "fill price must be positive".to_string(),
            ));
        }
        self.validate_placement(&request).await?;
        let order = build_order(request);

        let portfolio = self.repository.get_portfolio(order.portfolio_id).await?;
        let own_side = order.side.implied_position();
        let same_side = self
            .repository
            .get_position(order.portfolio_id, &order.symbol, own_side)
            .await?;
        let opposite_side = self
            .repository
            .get_position(order.portfolio_id, &order.symbol, own_side.opposite())
            .await?;

        let effect = apply_fill(&FillContext {
            portfolio: &portfolio,
            order: &order,
            same_side: same_side.as_ref(),
            opposite_side: opposite_side.as_ref(),
            fill_price,
            fill_quantity: order.quantity,
            now: Utc::now(),
        });

        self.repository.commit_order_fill(&order, &effect).await?;
        Ok(effect.trade)
    }

    /// The placement gate: rejections happen here, before any store mutation.
    async fn validate_placement(&self, request: &OrderRequest) -> Result<(), ExecutorError> {
        if request.quantity <= Decimal::ZERO {
            return Err(ExecutorError::Validation(
                "order quantity must be positive".to_string(),
            ));
        }
        if request.order_type.requires_price() && request.price.is_none() {
            return Err(ExecutorError::Validation(format!(
                "{} orders require a price",
                request.order_type
            )));
        }

        let portfolio = self.repository.get_portfolio(request.portfolio_id).await?;

        if request.reduce_only {
            // Reduce-only may never open exposure, so the requested quantity
            // must fit inside the opposing position. It bypasses the margin
            // check for the same reason.
            let covering = self
                .repository
                .get_position(
                    request.portfolio_id,
                    &request.symbol,
                    request.side.implied_position().opposite(),
                )
                .await?;
            let available = covering.map_or(Decimal::ZERO, |p| p.quantity);
            if request.quantity > available {
                return Err(ExecutorError::Validation(format!(
                    "reduce-only quantity {} exceeds open exposure {}",
                    request.quantity, available
                )));
            }
        } else if let Some(price) = request.price {
            let required = request.quantity * price / portfolio.leverage;
            if required > portfolio.balance {
                return Err(ExecutorError::InsufficientFunds {
                    required,
                    available: portfolio.balance,
                });
            }
        }

        Ok(())
    }

    /// Fills an open order at the given execution price.
    ///
    /// `fill_quantity` defaults to the order's outstanding quantity. The
    /// netting transition runs on in-memory copies and the resulting
    /// [`core_types::FillEffect`] commits in one transaction; a constraint
    /// violation anywhere rolls the whole fill back.
    pub async fn fill_order(
        &self,
        order_id: Uuid,
        fill_price: Decimal,
        fill_quantity: Option<Decimal>,
    ) -> Result<Trade, ExecutorError> {
        if fill_price <= Decimal::ZERO {
            return Err(ExecutorError::Validation(
                "fill price must be positive".to_string(),
            ));
        }

        let order = self.repository.get_order(order_id).await?;
        if !order.status.is_open() {
            return Err(ExecutorError::Validation(format!(
                "order {} is {} and cannot be filled",
                order.order_id, order.status
            )));
        }

        let fill_quantity = fill_quantity.unwrap_or_else(|| order.remaining_quantity());
        if fill_quantity <= Decimal::ZERO {
            return Err(ExecutorError::Validation(
                "fill quantity must be positive".to_string(),
            ));
        }
        if fill_quantity > order.remaining_quantity() {
            return Err(ExecutorError::Validation(format!(
                "fill quantity {} exceeds outstanding {}",
                fill_quantity,
                order.remaining_quantity()
            )));
        }

        let portfolio = self.repository.get_portfolio(order.portfolio_id).await?;
        let own_side = order.side.implied_position();
        let same_side = self
            .repository
            .get_position(order.portfolio_id, &order.symbol, own_side)
            .await?;
        let opposite_side = self
            .repository
            .get_position(order.portfolio_id, &order.symbol, own_side.opposite())
            .await?;

        let effect = apply_fill(&FillContext {
            portfolio: &portfolio,
            order: &order,
            same_side: same_side.as_ref(),
            opposite_side: opposite_side.as_ref(),
            fill_price,
            fill_quantity,
            now: Utc::now(),
        });

        self.repository.commit_fill(&effect).await?;
        Ok(effect.trade)
    }

    /// Cancels an order that has not finished filling.
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<Order, ExecutorError> {
        match self.repository.cancel_order(order_id).await {
            Ok(order) => Ok(order),
            // A cancel racing a fill is a rejection, not a storage fault.
            Err(StorageError::ConstraintViolation(msg)) => Err(ExecutorError::Validation(msg)),
            Err(other) => Err(other.into()),
        }
    }

    /// The repository this engine commits through, shared with collaborators
    /// that need read access (valuation, the decision adapter).
    pub fn repository(&self) -> &LedgerRepository {
        &self.repository
    }
}

fn build_order(request: OrderRequest) -> Order {
    Order {
        order_id: Uuid::new_v4(),
        portfolio_id: request.portfolio_id,
        symbol: request.symbol,
        side: request.side,
        order_type: request.order_type,
        quantity: request.quantity,
        price: request.price,
        stop_price: request.stop_price,
        filled_quantity: Decimal::ZERO,
        avg_price: None,
        status: OrderStatus::Pending,
        reduce_only: request.reduce_only,
        created_at: Utc::now(),
        filled_at: None,
    }
}
