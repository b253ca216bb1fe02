use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// The root configuration structure for the arena ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub competition: Competition,
    #[serde(default)]
    pub execution: ExecutionPolicy,
    pub database: DatabaseSettings,
}

/// Defaults applied to every portfolio created for a competition.
#[derive(Debug, Clone, Deserialize)]
pub struct Competition {
    /// The starting cash balance each agent receives.
    pub initial_balance: Decimal,
    /// The quote currency all balances are denominated in (e.g., "USDT").
    pub currency: String,
    /// The leverage factor applied to margin checks. 1 means fully funded.
    #[serde(default = "default_leverage")]
    pub leverage: Decimal,
    /// The fee charged on each fill as a fraction of notional.
    /// 0.001 corresponds to 0.1%.
    pub fee_rate: Decimal,
}

/// Clamping policy for the decision adapter.
///
/// These are heuristics, not exchange rules, so they are configuration rather
/// than constants baked into the execution path.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionPolicy {
    /// The fraction of cash a single order may commit. 0.9 means an agent can
    /// never risk more than 90% of its remaining cash on one order.
    #[serde(default = "default_cash_utilization")]
    pub cash_utilization: Decimal,
    /// The margin fraction required to open a short position.
    #[serde(default = "default_short_margin")]
    pub short_margin_requirement: Decimal,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            cash_utilization: default_cash_utilization(),
            short_margin_requirement: default_short_margin(),
        }
    }
}

/// Connection settings for the ledger store.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// The SQLite url for the competition ledger (e.g., "sqlite://arena.db").
    pub url: String,
}

fn default_leverage() -> Decimal {
    Decimal::ONE
}

fn default_cash_utilization() -> Decimal {
    dec!(0.9)
}

fn default_short_margin() -> Decimal {
    dec!(0.3)
}
