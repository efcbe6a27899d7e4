//! Core simulation engine components.
//!
//! This module provides the fundamental types for backtesting:
//! - `Bar` / `BarSeries`: OHLC data stored as parallel arrays, plus engineered feature columns.
//! - `Position`: The single open trade and its exit rules.
//! - `Trade`: A closed position with its realized P&L.
//! - `Backtest`: The bar loop driving a strategy and producing a `Report`.

mod bar;
mod bts;
mod position;
mod trade;

pub use bar::*;
pub use bts::*;
pub use position::*;
pub use trade::*;

pub(crate) use bar::as_of;
