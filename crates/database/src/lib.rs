//! # Arena Database Crate
//!
//! This crate acts as the high-level, application-specific interface to the
//! embedded SQLite ledger. It is the system's "book of record."
//!
//! ## Architectural Principles
//!
//! - **Storage Adapter:** All SQL and row-mapping logic lives here, behind a
//!   clean API the execution and valuation layers consume. Nothing outside
//!   this crate knows the schema.
//! - **Sole Transaction Boundary:** Every mutating external operation runs as
//!   one atomic unit of work. A fill commits its balance delta, position
//!   writes, order bookkeeping, and trade row together or not at all.
//! - **Injected Handle:** The connection pool is built from an injected url
//!   and handed to `LedgerRepository::new`; there is no hidden global state
//!   or environment probing.
//!
//! ## Public API
//!
//! - `connect` / `connect_in_memory`: establish the pooled SQLite handle.
//! - `run_migrations`: apply schema migrations at startup.
//! - `LedgerRepository`: CRUD over the four entities plus the composite
//!   units of work (`commit_fill`, `reset_portfolio`).
//! - `StorageError`: distinguishes `NotFound`, `ConstraintViolation`, and
//!   I/O failure.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod repository;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, connect_in_memory, run_migrations};
pub use error::StorageError;
pub use repository::{LeaderboardEntry, LedgerRepository, MarkUpdate, NewPortfolio};
