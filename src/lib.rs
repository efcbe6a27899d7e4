//! # BTS-ML: BackTest Strategies for Machine Learning Models
//!
//! **BTS-ML** is a Rust library for backtesting candlestick strategies on OHLC bars and turning
//! their trades into labeled training examples for a predictive model.
//! It walks the bars once, feeds the strategy only the data it could have seen, and lets an
//! attached model size the take-profit of every entry.
//!
//! ## Why BTS-ML?
//! - **Causal by construction**: Strategies and models only ever see bars up to the current one.
//! - **As-of windows**: Feature rows are aligned with binary search, with a matched mask to keep labels in sync.
//! - **Deterministic**: Every run owns its state; one backtest can drive parallel parameter sweeps.
//! - **Technical Analysis Ready**: Add any indicator (EMA, RSI, ...) as a named feature column.
//!
//! ## Core Components
//! | Component   | Description                                                                                     |
//! |-------------|-------------------------------------------------------------------------------------------------|
//! | **`BarSeries`** | Sorted OHLC bars stored as parallel arrays, plus engineered feature columns.               |
//! | **`Position`** | The single open trade, its take-profit and stop-loss.                                       |
//! | **`Trade`** | A closed position with its P&L and training target.                                             |
//! | **`Statistics`** | Cash, drawdown, win/loss counters and the final `Summary`.                                |
//! | **`WindowExtractor`** | As-of lookback windows flattened into feature rows.                                  |
//! | **`Model`** | A `Predictor` with its window configuration.                                                   |
//! | **`Strategy`** | The per-bar decision hook, with ready-made candlestick strategies.                          |
//! | **`TrainingSet`** | Feature rows and labels built from a trade log.                                          |
//! | **`Optimizer`** | Runs parameter combinations in parallel.                                                   |
//! | **`Backtest`** | The engine that simulates strategy execution over historical data.                          |
//!
//! ## Exit Rules
//! | Rule               | Description                                                                                     |
//! |--------------------|-------------------------------------------------------------------------------------------------|
//! | **Stop-Loss**      | Checked first: a bar breaching both levels exits at the stop-loss.                             |
//! | **Take-Profit**    | Closes the position when the bar reaches the target price.                                     |
//!
//! A position never closes on the bar it was opened on, and only one position is open at a time.
//!
//! ## Getting Started
//! ### 1. Add BTS-ML to your project:
//! ```toml
//! [dependencies]
//! bts-ml = "*"
//! ta = "*"  # Optional: For technical analysis indicators
//! ```
//!
//! ### 2. Run a Simple Backtest:
//! ```rust
//! use bts_ml::prelude::*;
//!
//! fn main() {
//!     let bars = vec![
//!         Bar::from((1, 100.0, 101.0, 99.0, 100.0)),
//!         Bar::from((2, 100.0, 102.0, 98.0, 101.0)),
//!         Bar::from((3, 101.0, 106.0, 100.0, 105.0)),
//!     ];
//!     let series = BarSeries::new(bars).unwrap();
//!
//!     // Initialize backtest with $10,000
//!     let backtest = Backtest::new(series, 10_000.0).unwrap();
//!
//!     // Go long once, 5 above and below the close
//!     let report = backtest
//!         .run(|ctx: &mut Context<'_>| -> Result<()> {
//!             if ctx.index() == 0 {
//!                 let close = ctx.ohlc().close;
//!                 ctx.buy((close, close + 5.0, close - 5.0, ctx.timestamp()).into())?;
//!             }
//!             Ok(())
//!         })
//!         .unwrap();
//!
//!     // Print performance summary
//!     println!("{}", report.summary());
//! }
//! ```
//!
//! ### Output:
//! ```bash
//! === Backtest Summary ===
//! Initial Cash: 10000.00
//! Final Cash: 10005.00
//!
//! start time: 1
//! end time: 3
//! # of trades: 1
//! # of wins: 1
//! # of loses: 0
//! win rate: 100.00%
//! ...
//! profit factor: undefined
//! ```
//!
//! ### 3. Attach a Model:
//! ```rust
//! use bts_ml::prelude::*;
//!
//! let bars = (0..10)
//!     .map(|i| {
//!         let price = 100.0 + i as f64;
//!         Bar::from((1_704_189_600 + i * 60, price, price + 2.0, price - 2.0, price + 1.0))
//!     })
//!     .collect();
//! let series = BarSeries::new(bars).unwrap();
//!
//! // mean close of the window as the expected move
//! let mean = |rows: &[Vec<f64>]| -> Vec<f64> {
//!     rows.iter().map(|row| row.iter().sum::<f64>() / row.len() as f64 / 100.0).collect()
//! };
//! let backtest = Backtest::builder(series)
//!     .initial_cash(10_000.0)
//!     .predictor(mean)
//!     .columns(["close"])
//!     .rows(3)
//!     .build()
//!     .unwrap();
//!
//! let report = backtest.run(MomentumStrategy::default()).unwrap();
//! assert_eq!(report.summary().trades, report.trades().len());
//! ```
//!
//! ## Integrations
//! | Crate          | Purpose                                                                                     |
//! |----------------|---------------------------------------------------------------------------------------------|
//! | [`tracing`](https://crates.io/crates/tracing) | Structured logs of runs, entries and exits.                                  |
//! | [`rayon`](https://crates.io/crates/rayon) | Parallel processing for optimization.                                            |
//! | [`serde`](https://crates.io/crates/serde) | Serialize/deserialize trades, summaries and bars.                                |
//! | [`plotters`](https://crates.io/crates/plotters) | Visualize candlesticks, trades and equity curves.                          |
//!
//! ## Error Handling
//! BTS-ML uses custom error types to handle:
//! - Empty or unsorted bars.
//! - Incomplete model configuration.
//! - Predictors returning zero or several values for one event.
//!
//! Example:
//! ```rust
//! use bts_ml::prelude::*;
//!
//! let series = BarSeries::new(vec![Bar::from((1, 100.0, 101.0, 99.0, 100.0))]).unwrap();
//! let result = Backtest::builder(series)
//!     .predictor(|_: &[Vec<f64>]| vec![1.0])
//!     .columns(["close"])
//!     .build();
//!
//! match result {
//!     Err(Error::Configuration(msg)) => eprintln!("{msg}"),
//!     _ => unreachable!(),
//! }
//! ```
#![warn(missing_docs)]

/// Core simulation engine components: bars, positions, trades, and backtest logic.
pub mod engine;

/// Error types for the library.
pub mod errors;

/// Timestamp parsing and JSON persistence.
pub mod utils;

/// Performance statistics: drawdown, win rate, profit factor, etc.
pub mod metrics;

/// As-of lookback windows and feature rows.
pub mod window;

/// Predictor trait and model configuration.
pub mod predictor;

/// Strategy trait, per-bar context and trading hours.
pub mod strategy;

/// Candlestick and momentum strategies.
pub mod strategies;

/// Candlestick pattern predicates and features.
pub mod patterns;

/// Training sets built from trade logs.
pub mod training;

/// Strategy parameter optimization.
#[cfg(feature = "optimizer")]
pub mod optimizer;

/// Candlestick, trade and equity charts rendered to SVG or PNG.
#[cfg(feature = "draws")]
pub mod draws;

/// Re-exports of commonly used types and traits for convenience.
pub mod prelude {
    pub use super::*;
    pub use crate::engine::*;
    pub use crate::errors::*;
    pub use crate::metrics::*;
    pub use crate::patterns::{Ohlc, Pattern, Snapshot};
    pub use crate::predictor::*;
    pub use crate::strategies::*;
    pub use crate::strategy::*;
    pub use crate::training::*;
    pub use crate::utils::*;
    pub use crate::window::*;

    #[cfg(feature = "optimizer")]
    pub use crate::optimizer::*;

    #[cfg(feature = "draws")]
    pub use crate::draws::*;
}

/// Percentage offsets around a price.
pub trait PercentCalculus<Rhs = Self> {
    /// Returns the value raised by `percent` % (10.0 for 10 %).
    fn addpercent(self, percent: Rhs) -> Self;

    /// Returns the value lowered by `percent` %.
    fn subpercent(self, percent: Rhs) -> Self;
}

impl PercentCalculus for f64 {
    fn addpercent(self, percent: Self) -> Self {
        self * (1.0 + percent / 100.0)
    }

    fn subpercent(self, percent: Self) -> Self {
        self * (1.0 - percent / 100.0)
    }
}

#[cfg(test)]
#[test]
fn percent_offsets() {
    assert!((100.0.addpercent(10.0) - 110.0).abs() < 1e-9);
    assert!((100.0.subpercent(10.0) - 90.0).abs() < 1e-9);
    assert_eq!(100.0.addpercent(0.0), 100.0);
}
