//! Integration tests for the ledger store, run against a private in-memory
//! SQLite database per test.

use chrono::Utc;
use core_types::{
    FillEffect, MarginMode, Order, OrderSide, OrderStatus, OrderType, OrderUpdate, Position,
    PositionSide, Trade,
};
use database::{connect_in_memory, run_migrations, LedgerRepository, MarkUpdate, NewPortfolio, StorageError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

async fn ledger() -> LedgerRepository {
    let pool = connect_in_memory().await.expect("in-memory pool");
    run_migrations(&pool).await.expect("migrations");
    LedgerRepository::new(pool)
}

fn agent(name: &str) -> NewPortfolio {
    NewPortfolio {
        name: name.to_string(),
        initial_balance: dec!(10000),
        currency: "USDT".to_string(),
        leverage: Decimal::ONE,
        margin_mode: MarginMode::Cross,
        fee_rate: dec!(0.001),
    }
}

fn pending_order(portfolio_id: Uuid, side: OrderSide, quantity: Decimal) -> Order {
    Order {
        order_id: Uuid::new_v4(),
        portfolio_id,
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

/// A hand-built fill effect: open `quantity` long at `price`, fee included.
fn open_long_effect(order: &Order, price: Decimal, fee: Decimal) -> FillEffect {
    let now = Utc::now();
    FillEffect {
        portfolio_id: order.portfolio_id,
        trade: Trade {
            trade_id: Uuid::new_v4(),
            portfolio_id: order.portfolio_id,
            order_id: order.order_id,
            symbol: order.symbol.clone(),
            side: order.side,
            price,
            quantity: order.quantity,
            fee,
            pnl: Decimal::ZERO,
            executed_at: now,
        },
        balance_delta: -fee,
        position_upserts: vec![Position {
            position_id: Uuid::new_v4(),
            portfolio_id: order.portfolio_id,
            symbol: order.symbol.clone(),
            side: PositionSide::Long,
            quantity: order.quantity,
            entry_price: price,
            current_price: price,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            leverage: Decimal::ONE,
            liquidation_price: None,
            opened_at: now,
        }],
        position_deletes: vec![],
        order_update: OrderUpdate {
            order_id: order.order_id,
            filled_quantity: order.quantity,
            avg_price: price,
            status: OrderStatus::Filled,
            filled_at: now,
        },
    }
}

#[tokio::test]
async fn portfolio_round_trips_through_storage() {
    let repo = ledger().await;
    let created = repo.create_portfolio(agent("alpha")).await.unwrap();

    let fetched = repo.get_portfolio(created.portfolio_id).await.unwrap();
    assert_eq!(fetched.name, "alpha");
    assert_eq!(fetched.balance, dec!(10000));
    assert_eq!(fetched.initial_balance, dec!(10000));
    assert_eq!(fetched.margin_mode, MarginMode::Cross);
    assert_eq!(fetched.fee_rate, dec!(0.001));

    let by_name = repo.get_portfolio_by_name("alpha").await.unwrap();
    assert_eq!(by_name.portfolio_id, created.portfolio_id);
}

#[tokio::test]
async fn duplicate_portfolio_name_is_a_constraint_violation() {
    let repo = ledger().await;
    repo.create_portfolio(agent("alpha")).await.unwrap();

    let err = repo.create_portfolio(agent("alpha")).await.unwrap_err();
    assert!(matches!(err, StorageError::ConstraintViolation(_)));
}

#[tokio::test]
async fn unknown_portfolio_is_not_found() {
    let repo = ledger().await;
    let err = repo.get_portfolio(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound("portfolio")));
}

#[tokio::test]
async fn order_without_portfolio_violates_foreign_key() {
    let repo = ledger().await;
    let order = pending_order(Uuid::new_v4(), OrderSide::Buy, dec!(1));

    let err = repo.insert_order(&order).await.unwrap_err();
    assert!(matches!(err, StorageError::ConstraintViolation(_)));
}

#[tokio::test]
async fn second_position_on_same_symbol_and_side_is_rejected() {
    let repo = ledger().await;
    let portfolio = repo.create_portfolio(agent("alpha")).await.unwrap();

    let template = Position {
        position_id: Uuid::new_v4(),
        portfolio_id: portfolio.portfolio_id,
        symbol: "BTCUSDT".to_string(),
        side: PositionSide::Long,
        quantity: dec!(1),
        entry_price: dec!(100),
        current_price: dec!(100),
        unrealized_pnl: Decimal::ZERO,
        realized_pnl: Decimal::ZERO,
        leverage: Decimal::ONE,
        liquidation_price: None,
        opened_at: Utc::now(),
    };
    repo.upsert_position(&template).await.unwrap();

    // A distinct row on the same (portfolio, symbol, side) triple must abort.
    let duplicate = Position {
        position_id: Uuid::new_v4(),
        ..template.clone()
    };
    let err = repo.upsert_position(&duplicate).await.unwrap_err();
    assert!(matches!(err, StorageError::ConstraintViolation(_)));

    // Overwriting the same row by id remains legal.
    let reduced = Position {
        quantity: dec!(0.5),
        ..template
    };
    repo.upsert_position(&reduced).await.unwrap();
    let positions = repo.list_positions(portfolio.portfolio_id).await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].quantity, dec!(0.5));
}

#[tokio::test]
async fn commit_fill_is_atomic_and_reconciles_balance() {
    let repo = ledger().await;
    let portfolio = repo.create_portfolio(agent("alpha")).await.unwrap();

    let order = pending_order(portfolio.portfolio_id, OrderSide::Buy, dec!(10));
    repo.insert_order(&order).await.unwrap();
    repo.commit_fill(&open_long_effect(&order, dec!(100), dec!(1)))
        .await
        .unwrap();

    // Balance reconciliation: initial + Σpnl − Σfee.
    let stored = repo.get_portfolio(portfolio.portfolio_id).await.unwrap();
    let (pnl_total, fee_total) = repo.sum_trade_totals(portfolio.portfolio_id).await.unwrap();
    assert_eq!(stored.balance, dec!(9999));
    assert_eq!(stored.balance, stored.initial_balance + pnl_total - fee_total);

    let filled = repo.get_order(order.order_id).await.unwrap();
    assert_eq!(filled.status, OrderStatus::Filled);
    assert_eq!(filled.filled_quantity, dec!(10));
    assert_eq!(filled.avg_price, Some(dec!(100)));
    assert!(filled.filled_at.is_some());

    let trades = repo.list_trades(portfolio.portfolio_id, None).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].fee, dec!(1));
}

#[tokio::test]
async fn commit_order_fill_rolls_the_order_back_with_the_fill() {
    let repo = ledger().await;
    let portfolio = repo.create_portfolio(agent("alpha")).await.unwrap();

    // An existing long on the same symbol and side; the effect below carries
    // a fresh position_id, so its upsert trips the uniqueness constraint.
    repo.upsert_position(&Position {
        position_id: Uuid::new_v4(),
        portfolio_id: portfolio.portfolio_id,
        symbol: "BTCUSDT".to_string(),
        side: PositionSide::Long,
        quantity: dec!(5),
        entry_price: dec!(90),
        current_price: dec!(90),
        unrealized_pnl: Decimal::ZERO,
        realized_pnl: Decimal::ZERO,
        leverage: Decimal::ONE,
        liquidation_price: None,
        opened_at: Utc::now(),
    })
    .await
    .unwrap();

    let order = pending_order(portfolio.portfolio_id, OrderSide::Buy, dec!(10));
    let result = repo
        .commit_order_fill(&order, &open_long_effect(&order, dec!(100), dec!(1)))
        .await;
    assert!(matches!(result, Err(StorageError::ConstraintViolation(_))));

    // The whole unit rolled back: no order row, no trade, balance untouched.
    assert!(matches!(
        repo.get_order(order.order_id).await,
        Err(StorageError::NotFound(_))
    ));
    assert!(repo.list_trades(portfolio.portfolio_id, None).await.unwrap().is_empty());
    let stored = repo.get_portfolio(portfolio.portfolio_id).await.unwrap();
    assert_eq!(stored.balance, dec!(10000));
}

#[tokio::test]
async fn trade_listing_respects_the_limit() {
    let repo = ledger().await;
    let portfolio = repo.create_portfolio(agent("alpha")).await.unwrap();

    for symbol in ["BTCUSDT", "ETHUSDT", "SOLUSDT"] {
        let mut order = pending_order(portfolio.portfolio_id, OrderSide::Buy, dec!(1));
        order.symbol = symbol.to_string();
        repo.insert_order(&order).await.unwrap();
        repo.commit_fill(&open_long_effect(&order, dec!(100), Decimal::ZERO))
            .await
            .unwrap();
    }

    assert_eq!(repo.list_trades(portfolio.portfolio_id, Some(2)).await.unwrap().len(), 2);
    assert_eq!(repo.list_trades(portfolio.portfolio_id, None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn persist_marks_never_touches_financial_state() {
    let repo = ledger().await;
    let portfolio = repo.create_portfolio(agent("alpha")).await.unwrap();

    let order = pending_order(portfolio.portfolio_id, OrderSide::Buy, dec!(2));
    repo.insert_order(&order).await.unwrap();
    repo.commit_fill(&open_long_effect(&order, dec!(100), dec!(0.2)))
        .await
        .unwrap();

    let position = &repo.list_positions(portfolio.portfolio_id).await.unwrap()[0];
    repo.persist_marks(&[MarkUpdate {
        position_id: position.position_id,
        current_price: dec!(110),
        unrealized_pnl: dec!(20),
    }])
    .await
    .unwrap();

    let marked = &repo.list_positions(portfolio.portfolio_id).await.unwrap()[0];
    assert_eq!(marked.current_price, dec!(110));
    assert_eq!(marked.unrealized_pnl, dec!(20));
    assert_eq!(marked.quantity, dec!(2));
    assert_eq!(marked.realized_pnl, Decimal::ZERO);

    let balance_after = repo.get_portfolio(portfolio.portfolio_id).await.unwrap().balance;
    assert_eq!(balance_after, dec!(9999.8));
}

#[tokio::test]
async fn cancel_is_only_legal_while_the_order_is_open() {
    let repo = ledger().await;
    let portfolio = repo.create_portfolio(agent("alpha")).await.unwrap();

    let order = pending_order(portfolio.portfolio_id, OrderSide::Buy, dec!(1));
    repo.insert_order(&order).await.unwrap();

    let cancelled = repo.cancel_order(order.order_id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    // Cancelling twice is a constraint violation, not a silent success.
    let err = repo.cancel_order(order.order_id).await.unwrap_err();
    assert!(matches!(err, StorageError::ConstraintViolation(_)));

    let err = repo.cancel_order(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound("order")));
}

#[tokio::test]
async fn reset_restores_the_starting_state_and_is_idempotent() {
    let repo = ledger().await;
    let portfolio = repo.create_portfolio(agent("alpha")).await.unwrap();

    let order = pending_order(portfolio.portfolio_id, OrderSide::Buy, dec!(5));
    repo.insert_order(&order).await.unwrap();
    repo.commit_fill(&open_long_effect(&order, dec!(200), dec!(1)))
        .await
        .unwrap();

    for _ in 0..2 {
        repo.reset_portfolio(portfolio.portfolio_id).await.unwrap();

        let stored = repo.get_portfolio(portfolio.portfolio_id).await.unwrap();
        assert_eq!(stored.balance, stored.initial_balance);
        assert!(repo.list_positions(portfolio.portfolio_id).await.unwrap().is_empty());
        assert!(repo.list_trades(portfolio.portfolio_id, None).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn leaderboard_ranks_by_total_pnl() {
    let repo = ledger().await;
    let winner = repo.create_portfolio(agent("winner")).await.unwrap();
    let loser = repo.create_portfolio(agent("loser")).await.unwrap();

    repo.adjust_balance(winner.portfolio_id, dec!(500)).await.unwrap();
    repo.adjust_balance(loser.portfolio_id, dec!(-250)).await.unwrap();

    let board = repo.leaderboard().await.unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].name, "winner");
    assert_eq!(board[0].total_pnl, dec!(500));
    assert_eq!(board[1].name, "loser");
    assert_eq!(board[1].total_pnl, dec!(-250));
}
