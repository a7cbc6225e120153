//!
//! Common types and utilities shared by the market-data library and the watch client.
//!
//! This crate aggregates:
//! - `error`: unified error type `MarketError` used across the workspace.
//! - `result`: handy `Result<T, MarketError>` alias.
//! - `symbols`: ticker symbol normalisation and symbol-list parsing.
//! - `net`: API endpoints and request defaults.
#![warn(missing_docs)]
pub mod error;
pub mod result;
pub mod symbols;
pub mod net;

pub use error::MarketError;
pub use result::Result;
pub use symbols::Symbol;
