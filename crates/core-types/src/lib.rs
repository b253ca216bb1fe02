//! # Arena Core Types
//!
//! This crate is the shared vocabulary of the arena ledger. It defines the four
//! persisted entities (`Portfolio`, `Position`, `Order`, `Trade`), the enums
//! that classify them, and the boundary DTOs exchanged with the upstream
//! decision and market-data collaborators.
//!
//! As a Layer 0 crate it has no knowledge of storage or execution logic; every
//! other crate in the workspace depends on it.

// Declare the modules that make up this crate.
pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{DecisionAction, MarginMode, OrderSide, OrderStatus, OrderType, PositionSide};
pub use error::CoreError;
pub use structs::{
    Decision, ExecutionResult, ExecutionStatus, FillEffect, MarketSnapshot, Order, OrderUpdate,
    Portfolio, Position, Trade,
};
