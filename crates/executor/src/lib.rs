//! # Arena Executor Crate
//!
//! This crate provides the order execution engine and the portfolio valuation
//! service of the arena ledger.
//!
//! ## Architectural Principles
//!
//! - **State vs. Logic Decoupling:** The netting transition (`netting::apply_fill`)
//!   is a pure function over in-memory copies of the affected rows. It returns
//!   a `FillEffect` describing the complete outcome of a fill, which the
//!   ledger repository commits in a single transaction. This separation keeps
//!   the one non-trivial algorithm in the system unit-testable without a
//!   live store.
//! - **Every Failure Is a Value:** Validation failures and margin shortfalls
//!   are typed rejections computed before any mutation; nothing on the
//!   execution path panics.
//!
//! ## Public API
//!
//! - `ExecutionEngine`: places, fills, and cancels orders.
//! - `netting::apply_fill`: the close-before-open netting transition.
//! - `ValuationService`: mark-to-market reads that never touch cash.
//! - `ExecutorError`: the specific error types returned from this crate.

// Declare the modules that constitute this crate.
pub mod engine;
pub mod error;
pub mod netting;
pub mod valuation;

// Re-export the key components to provide a clean, public-facing API.
pub use engine::{ExecutionEngine, OrderRequest};
pub use error::ExecutorError;
pub use valuation::{PortfolioValuation, ValuationService};
