//! # Arena Configuration
//!
//! Strongly-typed settings for the competition ledger, loaded from
//! `arena.toml`. Components never probe the environment themselves: the
//! loaded `Settings` (database url, competition defaults, clamping policy)
//! are injected into each component at construction.

use crate::error::ConfigError;
use crate::settings::Settings;
use rust_decimal::Decimal;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{Competition, DatabaseSettings, ExecutionPolicy, Settings as Config};

/// Loads the application configuration from the given TOML file.
///
/// This function is the primary entry point for this crate. It reads the
/// configuration file, deserializes it into our strongly-typed `Settings`
/// struct, validates the policy ranges, and returns it.
pub fn load_config(path: &str) -> Result<Settings, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path))
        .build()?;

    let settings = builder.try_deserialize::<Settings>()?;
    validate(&settings)?;

    Ok(settings)
}

/// Rejects settings that would make the ledger arithmetic meaningless.
fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if settings.competition.initial_balance <= Decimal::ZERO {
        return Err(ConfigError::ValidationError(
            "competition.initial_balance must be positive".to_string(),
        ));
    }
    if settings.competition.fee_rate < Decimal::ZERO || settings.competition.fee_rate >= Decimal::ONE
    {
        return Err(ConfigError::ValidationError(
            "competition.fee_rate must be in [0, 1)".to_string(),
        ));
    }
    if settings.competition.leverage < Decimal::ONE {
        return Err(ConfigError::ValidationError(
            "competition.leverage must be at least 1".to_string(),
        ));
    }
    let policy = &settings.execution;
    if policy.cash_utilization <= Decimal::ZERO || policy.cash_utilization > Decimal::ONE {
        return Err(ConfigError::ValidationError(
            "execution.cash_utilization must be in (0, 1]".to_string(),
        ));
    }
    if policy.short_margin_requirement <= Decimal::ZERO
        || policy.short_margin_requirement > Decimal::ONE
    {
        return Err(ConfigError::ValidationError(
            "execution.short_margin_requirement must be in (0, 1]".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_settings() -> Settings {
        Settings {
            competition: Competition {
                initial_balance: dec!(10000),
                currency: "USDT".to_string(),
                leverage: Decimal::ONE,
                fee_rate: dec!(0.001),
            },
            execution: ExecutionPolicy::default(),
            database: DatabaseSettings {
                url: "sqlite::memory:".to_string(),
            },
        }
    }

    #[test]
    fn default_policy_matches_documented_heuristics() {
        let policy = ExecutionPolicy::default();
        assert_eq!(policy.cash_utilization, dec!(0.9));
        assert_eq!(policy.short_margin_requirement, dec!(0.3));
    }

    #[test]
    fn valid_settings_pass_validation() {
        assert!(validate(&base_settings()).is_ok());
    }

    #[test]
    fn fee_rate_of_one_or_more_is_rejected() {
        let mut settings = base_settings();
        settings.competition.fee_rate = Decimal::ONE;
        assert!(matches!(
            validate(&settings),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn zero_cash_utilization_is_rejected() {
        let mut settings = base_settings();
        settings.execution.cash_utilization = Decimal::ZERO;
        assert!(validate(&settings).is_err());
    }
}
