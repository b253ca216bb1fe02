use crate::error::StorageError;
use chrono::{DateTime, Utc};
use core_types::{
    FillEffect, MarginMode, Order, OrderSide, OrderStatus, OrderType, OrderUpdate, Portfolio,
    Position, PositionSide, Trade,
};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use std::str::FromStr;
use uuid::Uuid;

/// The `LedgerRepository` provides a high-level, application-specific
/// interface to the ledger database. It encapsulates all SQL and row-mapping
/// logic, and it is the sole transaction boundary of the system: every
/// mutating external operation runs as one atomic unit of work here.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

/// The caller-supplied attributes of a new portfolio; id, timestamps, and the
/// starting balance are filled in by the repository.
#[derive(Debug, Clone)]
pub struct NewPortfolio {
    pub name: String,
    pub initial_balance: Decimal,
    pub currency: String,
    pub leverage: Decimal,
    pub margin_mode: MarginMode,
    pub fee_rate: Decimal,
}

/// A mark-price refresh for one position, written by the valuation service.
/// Touches only the observability columns, never quantity or realized PnL.
#[derive(Debug, Clone)]
pub struct MarkUpdate {
    pub position_id: Uuid,
    pub current_price: Decimal,
    pub unrealized_pnl: Decimal,
}

/// One row of the competition leaderboard, ranked by total PnL.
#[derive(Debug, Clone)]
pub struct LeaderboardEntry {
    pub portfolio_id: Uuid,
    pub name: String,
    pub balance: Decimal,
    /// Cash plus the mark value of all open positions.
    pub equity: Decimal,
    /// Realized PnL net of fees plus current unrealized PnL.
    pub total_pnl: Decimal,
}

impl LedgerRepository {
    /// Creates a new `LedgerRepository` with a shared database connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==========================================================================
    // Portfolios
    // ==========================================================================

    /// Creates one portfolio for a competing agent. The display name is
    /// unique per competition; a duplicate aborts with a constraint violation.
    pub async fn create_portfolio(&self, new: NewPortfolio) -> Result<Portfolio, StorageError> {
        let portfolio = Portfolio {
            portfolio_id: Uuid::new_v4(),
            name: new.name,
            initial_balance: new.initial_balance,
            balance: new.initial_balance,
            currency: new.currency,
            leverage: new.leverage,
            margin_mode: new.margin_mode,
            fee_rate: new.fee_rate,
            created_at: Utc::now(),
        };

        sqlx::query(
            r"
            INSERT INTO portfolios
                (portfolio_id, name, initial_balance, balance, currency, leverage, margin_mode, fee_rate, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(portfolio.portfolio_id.to_string())
        .bind(&portfolio.name)
        .bind(portfolio.initial_balance.to_string())
        .bind(portfolio.balance.to_string())
        .bind(&portfolio.currency)
        .bind(portfolio.leverage.to_string())
        .bind(portfolio.margin_mode.as_str())
        .bind(portfolio.fee_rate.to_string())
        .bind(portfolio.created_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(portfolio_id = %portfolio.portfolio_id, name = %portfolio.name, "Created portfolio");
        Ok(portfolio)
    }

    /// Fetches a portfolio by id.
    pub async fn get_portfolio(&self, portfolio_id: Uuid) -> Result<Portfolio, StorageError> {
        let row = sqlx::query("SELECT * FROM portfolios WHERE portfolio_id = ?1")
            .bind(portfolio_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound("portfolio"))?;

        portfolio_from_row(&row)
    }

    /// Fetches a portfolio by its unique display name.
    pub async fn get_portfolio_by_name(&self, name: &str) -> Result<Portfolio, StorageError> {
        let row = sqlx::query("SELECT * FROM portfolios WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound("portfolio"))?;

        portfolio_from_row(&row)
    }

    /// Lists every portfolio in the competition, oldest first.
    pub async fn list_portfolios(&self) -> Result<Vec<Portfolio>, StorageError> {
        let rows = sqlx::query("SELECT * FROM portfolios ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(portfolio_from_row).collect()
    }

    /// Applies a cash delta to a portfolio inside its own transaction and
    /// returns the new balance. The execution engine composes the same
    /// read-modify-write into `commit_fill`; nothing else writes balance.
    pub async fn adjust_balance(
        &self,
        portfolio_id: Uuid,
        delta: Decimal,
    ) -> Result<Decimal, StorageError> {
        let mut tx = self.pool.begin().await?;
        let balance = apply_balance_delta(&mut tx, portfolio_id, delta).await?;
        tx.commit().await?;
        Ok(balance)
    }

    // ==========================================================================
    // Positions
    // ==========================================================================

    /// Lists the open positions of one portfolio.
    pub async fn list_positions(&self, portfolio_id: Uuid) -> Result<Vec<Position>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM positions WHERE portfolio_id = ?1 ORDER BY opened_at ASC",
        )
        .bind(portfolio_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(position_from_row).collect()
    }

    /// Fetches the single position on (symbol, side), if one is open.
    pub async fn get_position(
        &self,
        portfolio_id: Uuid,
        symbol: &str,
        side: PositionSide,
    ) -> Result<Option<Position>, StorageError> {
        let row = sqlx::query(
            "SELECT * FROM positions WHERE portfolio_id = ?1 AND symbol = ?2 AND side = ?3",
        )
        .bind(portfolio_id.to_string())
        .bind(symbol)
        .bind(side.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(position_from_row).transpose()
    }

    /// Inserts or overwrites a position row in its own transaction.
    pub async fn upsert_position(&self, position: &Position) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        upsert_position_tx(&mut tx, position).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Deletes a fully-closed position row in its own transaction.
    pub async fn delete_position(&self, position_id: Uuid) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        delete_position_tx(&mut tx, position_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Writes refreshed mark prices and unrealized PnL for a batch of
    /// positions. This is the valuation service's only write path; it cannot
    /// touch balance, quantity, or realized PnL.
    pub async fn persist_marks(&self, marks: &[MarkUpdate]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        for mark in marks {
            sqlx::query(
                "UPDATE positions SET current_price = ?1, unrealized_pnl = ?2 WHERE position_id = ?3",
            )
            .bind(mark.current_price.to_string())
            .bind(mark.unrealized_pnl.to_string())
            .bind(mark.position_id.to_string())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // ==========================================================================
    // Orders
    // ==========================================================================

    /// Persists a freshly validated order in `pending` status.
    pub async fn insert_order(&self, order: &Order) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        insert_order_tx(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Fetches an order by id.
    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, StorageError> {
        let row = sqlx::query("SELECT * FROM orders WHERE order_id = ?1")
            .bind(order_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound("order"))?;

        order_from_row(&row)
    }

    /// Writes the fill bookkeeping onto an order in its own transaction.
    pub async fn update_order_fill(&self, update: &OrderUpdate) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        update_order_fill_tx(&mut tx, update).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Cancels an order that has not finished filling.
    ///
    /// Filled and already-cancelled orders are immutable; attempting to
    /// cancel one aborts with a constraint violation.
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<Order, StorageError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM orders WHERE order_id = ?1")
            .bind(order_id.to_string())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StorageError::NotFound("order"))?;
        let mut order = order_from_row(&row)?;

        if !order.status.is_open() {
            return Err(StorageError::ConstraintViolation(format!(
                "order {} is {} and cannot be cancelled",
                order.order_id, order.status
            )));
        }

        sqlx::query("UPDATE orders SET status = ?1 WHERE order_id = ?2")
            .bind(OrderStatus::Cancelled.as_str())
            .bind(order.order_id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        order.status = OrderStatus::Cancelled;
        tracing::info!(order_id = %order.order_id, "Cancelled order");
        Ok(order)
    }

    // ==========================================================================
    // Trades
    // ==========================================================================

    /// Lists the most recent trades of one portfolio, newest first.
    /// `limit = None` returns the full history.
    pub async fn list_trades(
        &self,
        portfolio_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<Trade>, StorageError> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map_or(-1i64, i64::from);

        let rows = sqlx::query(
            "SELECT * FROM trades WHERE portfolio_id = ?1 ORDER BY executed_at DESC, trade_id DESC LIMIT ?2",
        )
        .bind(portfolio_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(trade_from_row).collect()
    }

    /// Appends one immutable trade row in its own transaction.
    pub async fn insert_trade(&self, trade: &Trade) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        insert_trade_tx(&mut tx, trade).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Sums realized PnL and fees over a portfolio's full trade history.
    ///
    /// The decimal columns are TEXT, so the fold happens here rather than in
    /// SQL where SQLite would coerce to floats and drift.
    pub async fn sum_trade_totals(
        &self,
        portfolio_id: Uuid,
    ) -> Result<(Decimal, Decimal), StorageError> {
        let rows = sqlx::query("SELECT pnl, fee FROM trades WHERE portfolio_id = ?1")
            .bind(portfolio_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let mut pnl_total = Decimal::ZERO;
        let mut fee_total = Decimal::ZERO;
        for row in &rows {
            pnl_total += get_decimal(row, "pnl")?;
            fee_total += get_decimal(row, "fee")?;
        }
        Ok((pnl_total, fee_total))
    }

    // ==========================================================================
    // Composite units of work
    // ==========================================================================

    /// Commits the complete outcome of one fill in a single transaction:
    /// balance delta, position upserts and deletes, order bookkeeping, and
    /// the trade row. Any constraint violation rolls the whole unit back.
    pub async fn commit_fill(&self, effect: &FillEffect) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        apply_balance_delta(&mut tx, effect.portfolio_id, effect.balance_delta).await?;

        for position in &effect.position_upserts {
            upsert_position_tx(&mut tx, position).await?;
        }
        for position_id in &effect.position_deletes {
            delete_position_tx(&mut tx, *position_id).await?;
        }

        update_order_fill_tx(&mut tx, &effect.order_update).await?;
        insert_trade_tx(&mut tx, &effect.trade).await?;

        tx.commit().await?;

        tracing::info!(
            portfolio_id = %effect.portfolio_id,
            order_id = %effect.order_update.order_id,
            price = %effect.trade.price,
            quantity = %effect.trade.quantity,
            pnl = %effect.trade.pnl,
            fee = %effect.trade.fee,
            "Committed fill"
        );
        Ok(())
    }

    /// Commits an order together with its immediate fill in a single
    /// transaction. The decision path never leaves a resting order behind:
    /// if any part of the fill aborts, the order row rolls back with it.
    pub async fn commit_order_fill(
        &self,
        order: &Order,
        effect: &FillEffect,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        insert_order_tx(&mut tx, order).await?;
        apply_balance_delta(&mut tx, effect.portfolio_id, effect.balance_delta).await?;

        for position in &effect.position_upserts {
            upsert_position_tx(&mut tx, position).await?;
        }
        for position_id in &effect.position_deletes {
            delete_position_tx(&mut tx, *position_id).await?;
        }

        update_order_fill_tx(&mut tx, &effect.order_update).await?;
        insert_trade_tx(&mut tx, &effect.trade).await?;

        tx.commit().await?;

        tracing::info!(
            portfolio_id = %effect.portfolio_id,
            order_id = %order.order_id,
            price = %effect.trade.price,
            quantity = %effect.trade.quantity,
            pnl = %effect.trade.pnl,
            fee = %effect.trade.fee,
            "Committed order and fill"
        );
        Ok(())
    }

    /// Wipes a portfolio back to its starting state: all trades, orders, and
    /// positions are deleted and the balance returns to `initial_balance`.
    /// Running it twice is a no-op the second time.
    pub async fn reset_portfolio(&self, portfolio_id: Uuid) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        let initial: String = sqlx::query_scalar(
            "SELECT initial_balance FROM portfolios WHERE portfolio_id = ?1",
        )
        .bind(portfolio_id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StorageError::NotFound("portfolio"))?;

        // Trades reference orders, so they go first.
        sqlx::query("DELETE FROM trades WHERE portfolio_id = ?1")
            .bind(portfolio_id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM orders WHERE portfolio_id = ?1")
            .bind(portfolio_id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM positions WHERE portfolio_id = ?1")
            .bind(portfolio_id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE portfolios SET balance = ?1 WHERE portfolio_id = ?2")
            .bind(&initial)
            .bind(portfolio_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(portfolio_id = %portfolio_id, "Reset portfolio");
        Ok(())
    }

    /// Ranks all portfolios by total PnL (realized net of fees plus current
    /// unrealized, as last marked).
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let portfolios = self.list_portfolios().await?;

        let mut entries = Vec::with_capacity(portfolios.len());
        for portfolio in portfolios {
            let positions = self.list_positions(portfolio.portfolio_id).await?;
            let mark_value: Decimal = positions
                .iter()
                .map(|p| p.quantity * p.current_price)
                .sum();
            let unrealized: Decimal = positions.iter().map(|p| p.unrealized_pnl).sum();

            entries.push(LeaderboardEntry {
                portfolio_id: portfolio.portfolio_id,
                name: portfolio.name,
                balance: portfolio.balance,
                equity: portfolio.balance + mark_value,
                total_pnl: portfolio.balance - portfolio.initial_balance + unrealized,
            });
        }

        entries.sort_by(|a, b| b.total_pnl.cmp(&a.total_pnl));
        Ok(entries)
    }
}

// ==============================================================================
// Transaction-scoped statement helpers
// ==============================================================================

async fn apply_balance_delta(
    tx: &mut Transaction<'_, Sqlite>,
    portfolio_id: Uuid,
    delta: Decimal,
) -> Result<Decimal, StorageError> {
    let balance_text: String =
        sqlx::query_scalar("SELECT balance FROM portfolios WHERE portfolio_id = ?1")
            .bind(portfolio_id.to_string())
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(StorageError::NotFound("portfolio"))?;

    let balance = parse_decimal(&balance_text, "portfolios.balance")? + delta;

    sqlx::query("UPDATE portfolios SET balance = ?1 WHERE portfolio_id = ?2")
        .bind(balance.to_string())
        .bind(portfolio_id.to_string())
        .execute(&mut **tx)
        .await?;

    Ok(balance)
}

async fn insert_order_tx(
    tx: &mut Transaction<'_, Sqlite>,
    order: &Order,
) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO orders
            (order_id, portfolio_id, symbol, side, order_type, quantity, price, stop_price,
             filled_qty, avg_price, status, reduce_only, created_at, filled_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ",
    )
    .bind(order.order_id.to_string())
    .bind(order.portfolio_id.to_string())
    .bind(&order.symbol)
    .bind(order.side.as_str())
    .bind(order.order_type.as_str())
    .bind(order.quantity.to_string())
    .bind(order.price.map(|p| p.to_string()))
    .bind(order.stop_price.map(|p| p.to_string()))
    .bind(order.filled_quantity.to_string())
    .bind(order.avg_price.map(|p| p.to_string()))
    .bind(order.status.as_str())
    .bind(order.reduce_only)
    .bind(order.created_at)
    .bind(order.filled_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn upsert_position_tx(
    tx: &mut Transaction<'_, Sqlite>,
    position: &Position,
) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO positions
            (position_id, portfolio_id, symbol, side, quantity, entry_price, current_price,
             unrealized_pnl, realized_pnl, leverage, liquidation_price, opened_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT (position_id) DO UPDATE SET
            quantity = excluded.quantity,
            entry_price = excluded.entry_price,
            current_price = excluded.current_price,
            unrealized_pnl = excluded.unrealized_pnl,
            realized_pnl = excluded.realized_pnl,
            leverage = excluded.leverage,
            liquidation_price = excluded.liquidation_price
        ",
    )
    .bind(position.position_id.to_string())
    .bind(position.portfolio_id.to_string())
    .bind(&position.symbol)
    .bind(position.side.as_str())
    .bind(position.quantity.to_string())
    .bind(position.entry_price.to_string())
    .bind(position.current_price.to_string())
    .bind(position.unrealized_pnl.to_string())
    .bind(position.realized_pnl.to_string())
    .bind(position.leverage.to_string())
    .bind(position.liquidation_price.map(|p| p.to_string()))
    .bind(position.opened_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn delete_position_tx(
    tx: &mut Transaction<'_, Sqlite>,
    position_id: Uuid,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM positions WHERE position_id = ?1")
        .bind(position_id.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn update_order_fill_tx(
    tx: &mut Transaction<'_, Sqlite>,
    update: &OrderUpdate,
) -> Result<(), StorageError> {
    let result = sqlx::query(
        "UPDATE orders SET filled_qty = ?1, avg_price = ?2, status = ?3, filled_at = ?4 WHERE order_id = ?5",
    )
    .bind(update.filled_quantity.to_string())
    .bind(update.avg_price.to_string())
    .bind(update.status.as_str())
    .bind(update.filled_at)
    .bind(update.order_id.to_string())
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound("order"));
    }
    Ok(())
}

async fn insert_trade_tx(
    tx: &mut Transaction<'_, Sqlite>,
    trade: &Trade,
) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO trades
            (trade_id, portfolio_id, order_id, symbol, side, price, quantity, fee, pnl, executed_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ",
    )
    .bind(trade.trade_id.to_string())
    .bind(trade.portfolio_id.to_string())
    .bind(trade.order_id.to_string())
    .bind(&trade.symbol)
    .bind(trade.side.as_str())
    .bind(trade.price.to_string())
    .bind(trade.quantity.to_string())
    .bind(trade.fee.to_string())
    .bind(trade.pnl.to_string())
    .bind(trade.executed_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// ==============================================================================
// Row mapping
// ==============================================================================

fn parse_decimal(text: &str, column: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(text)
        .map_err(|e| StorageError::Corrupt(format!("{column}: {e}")))
}

fn get_decimal(row: &SqliteRow, column: &str) -> Result<Decimal, StorageError> {
    let text: String = row.try_get(column)?;
    parse_decimal(&text, column)
}

fn get_decimal_opt(row: &SqliteRow, column: &str) -> Result<Option<Decimal>, StorageError> {
    let text: Option<String> = row.try_get(column)?;
    text.as_deref()
        .map(|t| parse_decimal(t, column))
        .transpose()
}

fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid, StorageError> {
    let text: String = row.try_get(column)?;
    Uuid::parse_str(&text).map_err(|e| StorageError::Corrupt(format!("{column}: {e}")))
}

fn portfolio_from_row(row: &SqliteRow) -> Result<Portfolio, StorageError> {
    let margin_mode: String = row.try_get("margin_mode")?;
    Ok(Portfolio {
        portfolio_id: get_uuid(row, "portfolio_id")?,
        name: row.try_get("name")?,
        initial_balance: get_decimal(row, "initial_balance")?,
        balance: get_decimal(row, "balance")?,
        currency: row.try_get("currency")?,
        leverage: get_decimal(row, "leverage")?,
        margin_mode: margin_mode.parse::<MarginMode>()?,
        fee_rate: get_decimal(row, "fee_rate")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn position_from_row(row: &SqliteRow) -> Result<Position, StorageError> {
    let side: String = row.try_get("side")?;
    Ok(Position {
        position_id: get_uuid(row, "position_id")?,
        portfolio_id: get_uuid(row, "portfolio_id")?,
        symbol: row.try_get("symbol")?,
        side: side.parse::<PositionSide>()?,
        quantity: get_decimal(row, "quantity")?,
        entry_price: get_decimal(row, "entry_price")?,
        current_price: get_decimal(row, "current_price")?,
        unrealized_pnl: get_decimal(row, "unrealized_pnl")?,
        realized_pnl: get_decimal(row, "realized_pnl")?,
        leverage: get_decimal(row, "leverage")?,
        liquidation_price: get_decimal_opt(row, "liquidation_price")?,
        opened_at: row.try_get::<DateTime<Utc>, _>("opened_at")?,
    })
}

fn order_from_row(row: &SqliteRow) -> Result<Order, StorageError> {
    let side: String = row.try_get("side")?;
    let order_type: String = row.try_get("order_type")?;
    let status: String = row.try_get("status")?;
    Ok(Order {
        order_id: get_uuid(row, "order_id")?,
        portfolio_id: get_uuid(row, "portfolio_id")?,
        symbol: row.try_get("symbol")?,
        side: side.parse::<OrderSide>()?,
        order_type: order_type.parse::<OrderType>()?,
        quantity: get_decimal(row, "quantity")?,
        price: get_decimal_opt(row, "price")?,
        stop_price: get_decimal_opt(row, "stop_price")?,
        filled_quantity: get_decimal(row, "filled_qty")?,
        avg_price: get_decimal_opt(row, "avg_price")?,
        status: status.parse::<OrderStatus>()?,
        reduce_only: row.try_get("reduce_only")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        filled_at: row.try_get::<Option<DateTime<Utc>>, _>("filled_at")?,
    })
}

fn trade_from_row(row: &SqliteRow) -> Result<Trade, StorageError> {
    let side: String = row.try_get("side")?;
    Ok(Trade {
        trade_id: get_uuid(row, "trade_id")?,
        portfolio_id: get_uuid(row, "portfolio_id")?,
        order_id: get_uuid(row, "order_id")?,
        symbol: row.try_get("symbol")?,
        side: side.parse::<OrderSide>()?,
        price: get_decimal(row, "price")?,
        quantity: get_decimal(row, "quantity")?,
        fee: get_decimal(row, "fee")?,
        pnl: get_decimal(row, "pnl")?,
        executed_at: row.try_get::<DateTime<Utc>, _>("executed_at")?,
    })
}
