use clap::{Parser, Subcommand};
use comfy_table::Table;
use configuration::load_config;
use core_types::{Decision, MarketSnapshot};
use database::{connect, run_migrations, LedgerRepository, NewPortfolio};
use engine::DecisionAdapter;
use executor::{ExecutionEngine, ValuationService};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

/// The main entry point for the arena competition ledger.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Load the configuration and open the injected ledger handle.
    let settings = load_config(&cli.config)?;
    let pool = connect(&settings.database.url).await?;
    run_migrations(&pool).await?;
    tracing::debug!(url = %settings.database.url, "Ledger ready");
    let repository = LedgerRepository::new(pool);

    match cli.command {
        Commands::CreatePortfolio(args) => handle_create(args, &settings, &repository).await,
        Commands::Execute(args) => handle_execute(args, &settings, &repository).await,
        Commands::Valuate(args) => handle_valuate(args, &repository).await,
        Commands::Positions(args) => handle_positions(args, &repository).await,
        Commands::Trades(args) => handle_trades(args, &repository).await,
        Commands::Leaderboard => handle_leaderboard(&repository).await,
        Commands::Reset(args) => handle_reset(args, &repository).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A paper-trading ledger and order-execution engine for trading-agent competitions.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (without extension).
    #[arg(long, default_value = "arena")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new agent portfolio with the competition defaults.
    CreatePortfolio(CreateArgs),
    /// Execute one trading decision against a market snapshot.
    Execute(ExecuteArgs),
    /// Mark a portfolio to market and print its valuation.
    Valuate(ValuateArgs),
    /// List a portfolio's open positions.
    Positions(PortfolioArgs),
    /// List a portfolio's most recent trades.
    Trades(TradesArgs),
    /// Rank all portfolios by total PnL.
    Leaderboard,
    /// Wipe a portfolio back to its initial balance.
    Reset(PortfolioArgs),
}

#[derive(Parser)]
struct CreateArgs {
    /// The agent's display name (unique per competition).
    #[arg(long)]
    name: String,
}

#[derive(Parser)]
struct ExecuteArgs {
    /// The portfolio's display name.
    #[arg(long)]
    portfolio: String,

    /// The decision as JSON, e.g. '{"action":"buy","symbol":"BTCUSDT","quantity":"1.5"}'.
    #[arg(long)]
    decision: String,

    /// Best bid of the snapshot.
    #[arg(long)]
    bid: Decimal,

    /// Best ask of the snapshot.
    #[arg(long)]
    ask: Decimal,
}

#[derive(Parser)]
struct ValuateArgs {
    /// The portfolio's display name.
    #[arg(long)]
    portfolio: String,

    /// Current prices as SYMBOL=PRICE pairs (e.g. BTCUSDT=67000.5).
    #[arg(long = "price")]
    prices: Vec<String>,
}

#[derive(Parser)]
struct PortfolioArgs {
    /// The portfolio's display name.
    #[arg(long)]
    portfolio: String,
}

#[derive(Parser)]
struct TradesArgs {
    /// The portfolio's display name.
    #[arg(long)]
    portfolio: String,

    /// Maximum number of trades to show.
    #[arg(long, default_value_t = 20)]
    limit: u32,
}

// ==============================================================================
// Command Handlers
// ==============================================================================

async fn handle_create(
    args: CreateArgs,
    settings: &configuration::Config,
    repository: &LedgerRepository,
) -> anyhow::Result<()> {
    let portfolio = repository
        .create_portfolio(NewPortfolio {
            name: args.name,
            initial_balance: settings.competition.initial_balance,
            currency: settings.competition.currency.clone(),
            leverage: settings.competition.leverage,
            margin_mode: core_types::MarginMode::Cross,
            fee_rate: settings.competition.fee_rate,
        })
        .await?;

    println!(
        "Created portfolio '{}' ({}) with {} {}",
        portfolio.name, portfolio.portfolio_id, portfolio.balance, portfolio.currency
    );
    Ok(())
}

async fn handle_execute(
    args: ExecuteArgs,
    settings: &configuration::Config,
    repository: &LedgerRepository,
) -> anyhow::Result<()> {
    let portfolio = repository.get_portfolio_by_name(&args.portfolio).await?;
    let decision: Decision = serde_json::from_str(&args.decision)?;

    let snapshot = MarketSnapshot {
        symbol: decision.symbol.clone(),
        price: (args.bid + args.ask) / Decimal::TWO,
        bid: args.bid,
        ask: args.ask,
        high_24h: None,
        low_24h: None,
        volume_24h: None,
    };

    let adapter = DecisionAdapter::new(
        ExecutionEngine::new(repository.clone()),
        settings.execution.clone(),
    );
    let result = adapter
        .execute(portfolio.portfolio_id, Some(&decision), Some(&snapshot))
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn handle_valuate(args: ValuateArgs, repository: &LedgerRepository) -> anyhow::Result<()> {
    let portfolio = repository.get_portfolio_by_name(&args.portfolio).await?;

    let mut prices: HashMap<String, Decimal> = HashMap::new();
    for pair in &args.prices {
        let (symbol, price) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected SYMBOL=PRICE, got '{pair}'"))?;
        prices.insert(symbol.to_string(), price.parse()?);
    }

    let valuation = ValuationService::new(repository.clone())
        .valuate(portfolio.portfolio_id, &prices)
        .await?;

    let mut table = Table::new();
    table.set_header(["Symbol", "Side", "Qty", "Entry", "Mark", "Unrealized PnL"]);
    for position in &valuation.positions {
        table.add_row([
            position.symbol.clone(),
            position.side.to_string(),
            position.quantity.to_string(),
            position.entry_price.to_string(),
            position.current_price.to_string(),
            position.unrealized_pnl.to_string(),
        ]);
    }
    println!("{table}");
    println!(
        "cash: {}  portfolio value: {}  realized: {}  unrealized: {}  total PnL: {}",
        valuation.cash,
        valuation.portfolio_value,
        valuation.realized_pnl,
        valuation.unrealized_pnl,
        valuation.total_pnl
    );
    Ok(())
}

async fn handle_positions(args: PortfolioArgs, repository: &LedgerRepository) -> anyhow::Result<()> {
    let portfolio = repository.get_portfolio_by_name(&args.portfolio).await?;
    let positions = repository.list_positions(portfolio.portfolio_id).await?;

    let mut table = Table::new();
    table.set_header(["Symbol", "Side", "Qty", "Entry", "Mark", "Realized PnL", "Opened"]);
    for position in &positions {
        table.add_row([
            position.symbol.clone(),
            position.side.to_string(),
            position.quantity.to_string(),
            position.entry_price.to_string(),
            position.current_price.to_string(),
            position.realized_pnl.to_string(),
            position.opened_at.to_rfc3339(),
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn handle_trades(args: TradesArgs, repository: &LedgerRepository) -> anyhow::Result<()> {
    let portfolio = repository.get_portfolio_by_name(&args.portfolio).await?;
    let trades = repository
        .list_trades(portfolio.portfolio_id, Some(args.limit))
        .await?;

    let mut table = Table::new();
    table.set_header(["Time", "Symbol", "Side", "Price", "Qty", "Fee", "PnL"]);
    for trade in &trades {
        table.add_row([
            trade.executed_at.to_rfc3339(),
            trade.symbol.clone(),
            trade.side.to_string(),
            trade.price.to_string(),
            trade.quantity.to_string(),
            trade.fee.to_string(),
            trade.pnl.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn handle_leaderboard(repository: &LedgerRepository) -> anyhow::Result<()> {
    let entries = repository.leaderboard().await?;

    let mut table = Table::new();
    table.set_header(["Rank", "Agent", "Balance", "Equity", "Total PnL"]);
    for (rank, entry) in entries.iter().enumerate() {
        table.add_row([
            (rank + 1).to_string(),
            entry.name.clone(),
            entry.balance.to_string(),
            entry.equity.to_string(),
            entry.total_pnl.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn handle_reset(args: PortfolioArgs, repository: &LedgerRepository) -> anyhow::Result<()> {
    let portfolio = repository.get_portfolio_by_name(&args.portfolio).await?;
    repository.reset_portfolio(portfolio.portfolio_id).await?;
    println!("Reset portfolio '{}' to {}", portfolio.name, portfolio.initial_balance);
    Ok(())
}
