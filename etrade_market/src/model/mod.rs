//! Domain models for the market-data subsystem.
//!
//! - `quote`: the price table record and the quote endpoint's JSON payload.
//! - `price_table`: the symbol → quote map shared by pollers and callers.

pub mod price_table;
pub mod quote;
