//! The position-netting state transition.
//!
//! `apply_fill` is a pure function from in-memory copies of the affected rows
//! to a [`FillEffect`] the store commits atomically. A single fill always
//! nets against opposing exposure first and only then opens new exposure in
//! the same call; the fee is charged on the full fill quantity regardless of
//! how it splits between closing and opening.

use chrono::{DateTime, Utc};
use core_types::{FillEffect, Order, OrderStatus, OrderUpdate, Portfolio, Position, PositionSide, Trade};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Everything the netting transition needs, read before the transaction.
#[derive(Debug)]
pub struct FillContext<'a> {
    pub portfolio: &'a Portfolio,
    pub order: &'a Order,
    /// The open position on the order's own implied side, if any.
    pub same_side: Option<&'a Position>,
    /// The open position on the opposing side, if any. Netting consumes this
    /// before the fill may open anything new.
    pub opposite_side: Option<&'a Position>,
    pub fill_price: Decimal,
    pub fill_quantity: Decimal,
    pub now: DateTime<Utc>,
}

/// Computes the complete outcome of one fill.
///
/// This is the six-step protocol of the execution engine: fee on full
/// notional, close-before-open netting, weighted-average adds, balance delta
/// of `realized − fee`, order bookkeeping, and one trade row for the whole
/// fill.
pub fn apply_fill(ctx: &FillContext) -> FillEffect {
    let order = ctx.order;
    let own_side = order.side.implied_position();

    // --- 1. Fee on the full fill quantity ---
    let fee = ctx.fill_quantity * ctx.fill_price * ctx.portfolio.fee_rate;

    let mut realized_pnl = Decimal::ZERO;
    let mut upserts: Vec<Position> = Vec::new();
    let mut deletes: Vec<Uuid> = Vec::new();

    // --- 2/3. Net against opposing exposure first ---
    let mut remaining = ctx.fill_quantity;
    if let Some(opposite) = ctx.opposite_side {
        let close_qty = remaining.min(opposite.quantity);
        realized_pnl = match opposite.side {
            PositionSide::Long => (ctx.fill_price - opposite.entry_price) * close_qty,
            PositionSide::Short => (opposite.entry_price - ctx.fill_price) * close_qty,
        };
        remaining -= close_qty;

        if close_qty == opposite.quantity {
            deletes.push(opposite.position_id);
        } else {
            let mut reduced = opposite.clone();
            reduced.quantity -= close_qty;
            reduced.realized_pnl += realized_pnl;
            reduced.current_price = ctx.fill_price;
            reduced.unrealized_pnl = reduced.unrealized_at(ctx.fill_price);
            upserts.push(reduced);
        }
    }

    // --- 4/5. Open or add with the remainder ---
    if remaining > Decimal::ZERO {
        match ctx.same_side {
            Some(existing) => {
                // Average in: quantity-weighted entry price.
                let mut grown = existing.clone();
                let new_quantity = grown.quantity + remaining;
                grown.entry_price = (grown.entry_price * grown.quantity
                    + ctx.fill_price * remaining)
                    / new_quantity;
                grown.quantity = new_quantity;
                grown.current_price = ctx.fill_price;
                grown.unrealized_pnl = grown.unrealized_at(ctx.fill_price);
                grown.liquidation_price =
                    liquidation_price(own_side, grown.entry_price, ctx.portfolio.leverage);
                upserts.push(grown);
            }
            None => {
                upserts.push(Position {
                    position_id: Uuid::new_v4(),
                    portfolio_id: ctx.portfolio.portfolio_id,
                    symbol: order.symbol.clone(),
                    side: own_side,
                    quantity: remaining,
                    entry_price: ctx.fill_price,
                    current_price: ctx.fill_price,
                    unrealized_pnl: Decimal::ZERO,
                    realized_pnl: Decimal::ZERO,
                    leverage: ctx.portfolio.leverage,
                    liquidation_price: liquidation_price(
                        own_side,
                        ctx.fill_price,
                        ctx.portfolio.leverage,
                    ),
                    opened_at: ctx.now,
                });
            }
        }
    }

    // --- 7. Order bookkeeping: cumulative quantity and volume-weighted price ---
    let filled_quantity = order.filled_quantity + ctx.fill_quantity;
    let prior_avg = order.avg_price.unwrap_or(Decimal::ZERO);
    let avg_price = (prior_avg * order.filled_quantity + ctx.fill_price * ctx.fill_quantity)
        / filled_quantity;
    let status = if filled_quantity == order.quantity {
        OrderStatus::Filled
    } else {
        OrderStatus::Partial
    };

    // --- 8. One trade row covering the whole fill ---
    let trade = Trade {
        trade_id: Uuid::new_v4(),
        portfolio_id: ctx.portfolio.portfolio_id,
        order_id: order.order_id,
        symbol: order.symbol.clone(),
        side: order.side,
        price: ctx.fill_price,
        quantity: ctx.fill_quantity,
        fee,
        pnl: realized_pnl,
        executed_at: ctx.now,
    };

    FillEffect {
        portfolio_id: ctx.portfolio.portfolio_id,
        trade,
        // --- 6. Cash moves by realized PnL minus fee, nothing else ---
        balance_delta: realized_pnl - fee,
        position_upserts: upserts,
        position_deletes: deletes,
        order_update: OrderUpdate {
            order_id: order.order_id,
            filled_quantity,
            avg_price,
            status,
            filled_at: ctx.now,
        },
    }
}

/// The price at which a leveraged position exhausts its margin. Fully funded
/// positions (leverage 1) have no liquidation price.
fn liquidation_price(side: PositionSide, entry: Decimal, leverage: Decimal) -> Option<Decimal> {
    if leverage <= Decimal::ONE {
        return None;
    }
    let margin_fraction = Decimal::ONE / leverage;
    Some(match side {
        PositionSide::Long => entry * (Decimal::ONE - margin_fraction),
        PositionSide::Short => entry * (Decimal::ONE + margin_fraction),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{MarginMode, OrderSide, OrderType};
    use rust_decimal_macros::dec;

    fn portfolio() -> Portfolio {
        Portfolio {
            portfolio_id: Uuid::new_v4(),
            name: "agent".to_string(),
            initial_balance: dec!(10000),
            balance: dec!(10000),
            currency: "USDT".to_string(),
            leverage: Decimal::ONE,
            margin_mode: MarginMode::Cross,
            fee_rate: dec!(0.001),
            created_at: Utc::now(),
        }
    }

    fn order(portfolio: &Portfolio, side: OrderSide, quantity: Decimal) -> Order {
        Order {
            order_id: Uuid::new_v4(),
            portfolio_id: portfolio.portfolio_id,
            symbol: "BTCUSDT".to_string(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            stop_price: None,
            filled_quantity: Decimal::ZERO,
            avg_price: None,
            status: OrderStatus::Pending,
            reduce_only: false,
            created_at: Utc::now(),
            filled_at: None,
        }
    }

    fn open_position(
        portfolio: &Portfolio,
        side: PositionSide,
        quantity: Decimal,
        entry: Decimal,
    ) -> Position {
        Position {
            position_id: Uuid::new_v4(),
            portfolio_id: portfolio.portfolio_id,
            symbol: "BTCUSDT".to_string(),
            side,
            quantity,
            entry_price: entry,
            current_price: entry,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            leverage: Decimal::ONE,
            liquidation_price: None,
            opened_at: Utc::now(),
        }
    }

    #[test]
    fn opening_buy_creates_a_long_and_charges_only_the_fee() {
        let portfolio = portfolio();
        let order = order(&portfolio, OrderSide::Buy, dec!(10));

        let effect = apply_fill(&FillContext {
            portfolio: &portfolio,
            order: &order,
            same_side: None,
            opposite_side: None,
            fill_price: dec!(100),
            fill_quantity: dec!(10),
            now: Utc::now(),
        });

        // fee = 10 * 100 * 0.001 = 1; no realized pnl on a pure open
        assert_eq!(effect.trade.fee, dec!(1));
        assert_eq!(effect.trade.pnl, Decimal::ZERO);
        assert_eq!(effect.balance_delta, dec!(-1));

        assert_eq!(effect.position_upserts.len(), 1);
        let opened = &effect.position_upserts[0];
        assert_eq!(opened.side, PositionSide::Long);
        assert_eq!(opened.quantity, dec!(10));
        assert_eq!(opened.entry_price, dec!(100));
        assert!(opened.liquidation_price.is_none());
        assert!(effect.position_deletes.is_empty());

        assert_eq!(effect.order_update.status, OrderStatus::Filled);
        assert_eq!(effect.order_update.avg_price, dec!(100));
    }

    #[test]
    fn same_side_add_averages_the_entry_price() {
        let portfolio = portfolio();
        let order = order(&portfolio, OrderSide::Buy, dec!(10));
        let existing = open_position(&portfolio, PositionSide::Long, dec!(10), dec!(100));

        let effect = apply_fill(&FillContext {
            portfolio: &portfolio,
            order: &order,
            same_side: Some(&existing),
            opposite_side: None,
            fill_price: dec!(120),
            fill_quantity: dec!(10),
            now: Utc::now(),
        });

        let grown = &effect.position_upserts[0];
        assert_eq!(grown.position_id, existing.position_id);
        assert_eq!(grown.quantity, dec!(20));
        assert_eq!(grown.entry_price, dec!(110));
        assert_eq!(effect.trade.pnl, Decimal::ZERO);
    }

    #[test]
    fn partial_close_realizes_pnl_and_keeps_the_entry_price() {
        // The concrete ledger scenario: long 10 @ 100, sell 4 @ 120.
        let portfolio = portfolio();
        let order = order(&portfolio, OrderSide::Sell, dec!(4));
        let long = open_position(&portfolio, PositionSide::Long, dec!(10), dec!(100));

        let effect = apply_fill(&FillContext {
            portfolio: &portfolio,
            order: &order,
            same_side: None,
            opposite_side: Some(&long),
            fill_price: dec!(120),
            fill_quantity: dec!(4),
            now: Utc::now(),
        });

        // realized = (120 - 100) * 4 = 80; fee = 4 * 120 * 0.001 = 0.48
        assert_eq!(effect.trade.pnl, dec!(80));
        assert_eq!(effect.trade.fee, dec!(0.48));
        assert_eq!(effect.balance_delta, dec!(79.52));

        let reduced = &effect.position_upserts[0];
        assert_eq!(reduced.position_id, long.position_id);
        assert_eq!(reduced.quantity, dec!(6));
        assert_eq!(reduced.entry_price, dec!(100));
        assert_eq!(reduced.realized_pnl, dec!(80));
        assert!(effect.position_deletes.is_empty());
    }

    #[test]
    fn full_close_deletes_the_position_row() {
        let portfolio = portfolio();
        let order = order(&portfolio, OrderSide::Sell, dec!(10));
        let long = open_position(&portfolio, PositionSide::Long, dec!(10), dec!(100));

        let effect = apply_fill(&FillContext {
            portfolio: &portfolio,
            order: &order,
            same_side: None,
            opposite_side: Some(&long),
            fill_price: dec!(90),
            fill_quantity: dec!(10),
            now: Utc::now(),
        });

        assert_eq!(effect.trade.pnl, dec!(-100));
        assert!(effect.position_upserts.is_empty());
        assert_eq!(effect.position_deletes, vec![long.position_id]);
    }

    #[test]
    fn flip_closes_the_long_then_opens_a_short_in_one_fill() {
        // Long 5 @ 50; sell 8 @ 60 → close 5 (pnl 50), open short 3 @ 60.
        let portfolio = portfolio();
        let order = order(&portfolio, OrderSide::Sell, dec!(8));
        let long = open_position(&portfolio, PositionSide::Long, dec!(5), dec!(50));

        let effect = apply_fill(&FillContext {
            portfolio: &portfolio,
            order: &order,
            same_side: None,
            opposite_side: Some(&long),
            fill_price: dec!(60),
            fill_quantity: dec!(8),
            now: Utc::now(),
        });

        assert_eq!(effect.trade.pnl, dec!(50));
        // Fee covers the full 8-unit fill, not just the closing leg.
        assert_eq!(effect.trade.fee, dec!(8) * dec!(60) * dec!(0.001));
        assert_eq!(effect.trade.quantity, dec!(8));

        assert_eq!(effect.position_deletes, vec![long.position_id]);
        assert_eq!(effect.position_upserts.len(), 1);
        let flipped = &effect.position_upserts[0];
        assert_eq!(flipped.side, PositionSide::Short);
        assert_eq!(flipped.quantity, dec!(3));
        assert_eq!(flipped.entry_price, dec!(60));
    }

    #[test]
    fn short_close_realizes_pnl_with_inverted_sign() {
        let portfolio = portfolio();
        let order = order(&portfolio, OrderSide::Buy, dec!(5));
        let short = open_position(&portfolio, PositionSide::Short, dec!(5), dec!(200));

        let effect = apply_fill(&FillContext {
            portfolio: &portfolio,
            order: &order,
            same_side: None,
            opposite_side: Some(&short),
            fill_price: dec!(180),
            fill_quantity: dec!(5),
            now: Utc::now(),
        });

        // Short profits when the buy-back price is below entry.
        assert_eq!(effect.trade.pnl, dec!(100));
        assert_eq!(effect.position_deletes, vec![short.position_id]);
    }

    #[test]
    fn partial_fill_leaves_the_order_partially_filled_with_a_vwap() {
        let portfolio = portfolio();
        let mut order = order(&portfolio, OrderSide::Buy, dec!(10));
        order.filled_quantity = dec!(4);
        order.avg_price = Some(dec!(100));
        order.status = OrderStatus::Partial;

        let effect = apply_fill(&FillContext {
            portfolio: &portfolio,
            order: &order,
            same_side: None,
            opposite_side: None,
            fill_price: dec!(110),
            fill_quantity: dec!(4),
            now: Utc::now(),
        });

        assert_eq!(effect.order_update.filled_quantity, dec!(8));
        assert_eq!(effect.order_update.avg_price, dec!(105));
        assert_eq!(effect.order_update.status, OrderStatus::Partial);
    }

    #[test]
    fn leveraged_open_records_a_liquidation_price() {
        let mut leveraged = portfolio();
        leveraged.leverage = dec!(4);
        let order = order(&leveraged, OrderSide::Buy, dec!(1));

        let effect = apply_fill(&FillContext {
            portfolio: &leveraged,
            order: &order,
            same_side: None,
            opposite_side: None,
            fill_price: dec!(100),
            fill_quantity: dec!(1),
            now: Utc::now(),
        });

        assert_eq!(effect.position_upserts[0].liquidation_price, Some(dec!(75)));
    }
}
