//! # Arena Engine Crate
//!
//! The decision-facing layer of the arena ledger. It accepts the output of
//! an upstream decision collaborator (an LLM- or rule-based agent), clamps
//! it against the portfolio's cash and the configured execution policy, and
//! drives it through the execution engine as a market order filled at the
//! snapshot's quote.
//!
//! ## Architectural Principles
//!
//! - **Strict Boundary Types:** Decisions and snapshots arrive as structs
//!   parsed once at the system boundary. Free-form text salvage is the
//!   upstream collaborator's problem, never the ledger's.
//! - **Rejection Is a Value:** Every call returns a typed
//!   `ExecutionResult`, either `executed` or `rejected` with a reason.
//!   Only storage faults surface as errors.
//!
//! ## Public API
//!
//! - `DecisionAdapter`: `execute` one decision per agent per time-step;
//!   `reset` a portfolio to its starting state.
//! - `EngineError`: the non-recoverable failures of a call.

// Declare the modules that constitute this crate.
pub mod adapter;
pub mod error;

// Re-export the key components to provide a clean, public-facing API.
pub use adapter::DecisionAdapter;
pub use error::EngineError;
