use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    engine::{BarSeries, Position, Trade},
    errors::{Error, Result},
    metrics::{Statistics, Summary},
    predictor::{Model, Predictor},
    strategy::{Context, Strategy},
    window::WindowExtractor,
};

/// Initial cash used by [`BacktestBuilder`] when none is given.
pub const DEFAULT_INITIAL_CASH: f64 = 100_000.0;

/// Backtesting engine for trading strategies.
///
/// A backtest only holds read-only inputs: the bar series, the initial cash and an
/// optional model. Every [`Backtest::run`] owns its own position, trade log and
/// statistics, so one instance can drive many runs, from many threads.
#[derive(Debug, Clone)]
pub struct Backtest {
    series: Arc<BarSeries>,
    initial_cash: f64,
    model: Option<Model>,
}

impl Backtest {
    /// Creates a new backtest instance without model.
    ///
    /// ### Arguments
    /// * `series` - Bars to simulate.
    /// * `initial_cash` - Initial cash balance.
    ///
    /// ### Returns
    /// The new backtest instance, or [`Error::NegZeroBalance`].
    ///
    /// ### Example
    /// ```rust
    /// use bts_ml::prelude::*;
    ///
    /// let bar = BarBuilder::builder()
    ///     .timestamp(1_704_189_600)
    ///     .open(100.0)
    ///     .high(110.0)
    ///     .low(95.0)
    ///     .close(105.0)
    ///     .build()
    ///     .unwrap();
    ///
    /// let series = BarSeries::new(vec![bar]).unwrap();
    /// let bts = Backtest::new(series, 1000.0).unwrap();
    /// assert_eq!(bts.initial_cash(), 1000.0);
    /// ```
    pub fn new(series: impl Into<Arc<BarSeries>>, initial_cash: f64) -> Result<Self> {
        Self::builder(series).initial_cash(initial_cash).build()
    }

    /// Starts configuring a backtest, with or without model.
    pub fn builder(series: impl Into<Arc<BarSeries>>) -> BacktestBuilder {
        BacktestBuilder {
            series: series.into(),
            initial_cash: DEFAULT_INITIAL_CASH,
            predictor: None,
            columns: None,
            rows: None,
            pattern_features: false,
        }
    }

    /// Returns the bar series.
    pub fn series(&self) -> &BarSeries {
        &self.series
    }

    /// Returns the initial cash.
    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    /// Returns the attached model.
    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    /// Runs the backtest with a strategy.
    ///
    /// Bars are walked once in order. On each bar the strategy sees the data up to
    /// it and may request one entry; then the open position, if it was opened on an
    /// earlier bar, is checked against the bar's high and low.
    ///
    /// ### Arguments
    /// * `strategy` - A [`Strategy`], or a closure `FnMut(&mut Context<'_>) -> Result<()>`.
    ///
    /// ### Returns
    /// The run [`Report`], or the first error raised by the strategy.
    ///
    /// ### Example
    /// ```rust
    /// use bts_ml::prelude::*;
    ///
    /// let bars = vec![
    ///     Bar::from((1, 100.0, 101.0, 99.0, 100.0)),
    ///     Bar::from((2, 100.0, 106.0, 99.0, 105.0)),
    /// ];
    /// let bts = Backtest::new(BarSeries::new(bars).unwrap(), 1000.0).unwrap();
    /// let report = bts
    ///     .run(|ctx: &mut Context<'_>| -> Result<()> {
    ///         let close = ctx.ohlc().close;
    ///         ctx.buy((close, close + 5.0, close - 5.0, ctx.timestamp()).into())?;
    ///         Ok(())
    ///     })
    ///     .unwrap();
    /// assert_eq!(report.trades().len(), 1);
    /// assert_eq!(report.summary().net_profit, 5.0);
    /// ```
    pub fn run<S: Strategy>(&self, mut strategy: S) -> Result<Report> {
        let series = self.series.as_ref();
        let model = self.model.as_ref();
        let (timestamps, highs, lows) = (series.timestamps(), series.highs(), series.lows());

        let mut statistics = Statistics::new(self.initial_cash);
        let mut position: Option<Position> = None;
        let mut trades = Vec::new();
        let mut equity = Vec::new();

        info!(
            bars = series.len(),
            initial_cash = self.initial_cash,
            model = model.is_some(),
            "backtest started"
        );
        strategy.init();

        for index in 0..series.len() {
            let request = {
                let mut ctx = Context::new(index, series, model, position.as_ref());
                strategy.on_data(&mut ctx)?;
                ctx.take_request()
            };

            if position.is_none()
                && let Some((side, entry)) = request
            {
                debug!(index, ?side, price = entry.price, take_profit = entry.take_profit, stop_loss = entry.stop_loss, "position opened");
                position = Some(Position::open(side, entry, index, highs[index]));
            }

            // exits are only checked from the bar after the entry
            let closed = match position.as_mut() {
                Some(open) if open.entry_index() < index => {
                    open.update(highs[index]);
                    open.resolve(highs[index], lows[index])
                        .map(|(exit, price)| Trade::close(trades.len() + 1, open, exit, price, timestamps[index]))
                }
                _ => None,
            };

            if let Some(trade) = closed {
                position = None;
                statistics.record(trade.side(), trade.pnl());
                equity.push((trade.exit_time(), statistics.cash()));
                debug!(index, id = trade.id(), exit = ?trade.exit(), pnl = trade.pnl(), cash = statistics.cash(), "position closed");
                trades.push(trade);
            }
        }

        let summary = statistics.summary(series.start_time(), series.end_time());
        info!(
            trades = summary.trades,
            net_profit = summary.net_profit,
            max_drawdown = summary.max_drawdown,
            open_position = position.is_some(),
            "backtest finished"
        );

        Ok(Report {
            trades,
            summary,
            equity,
            open_position: position,
        })
    }
}

/// Builder for [`Backtest`].
///
/// The predictor, its columns and its lookback rows are given all together or not at all.
#[must_use]
pub struct BacktestBuilder {
    series: Arc<BarSeries>,
    initial_cash: f64,
    predictor: Option<Arc<dyn Predictor>>,
    columns: Option<Vec<String>>,
    rows: Option<usize>,
    pattern_features: bool,
}

impl BacktestBuilder {
    /// Sets the initial cash.
    pub fn initial_cash(mut self, initial_cash: f64) -> Self {
        self.initial_cash = initial_cash;
        self
    }

    /// Attaches a predictor.
    pub fn predictor<P: Predictor + 'static>(mut self, predictor: P) -> Self {
        self.predictor = Some(Arc::new(predictor));
        self
    }

    /// Sets the columns of the predictor's feature rows.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the number of bars in the predictor's lookback window.
    pub fn rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    /// Makes pattern strategies append their pattern features to the rows.
    pub fn pattern_features(mut self, pattern_features: bool) -> Self {
        self.pattern_features = pattern_features;
        self
    }

    /// Builds the backtest.
    ///
    /// ### Returns
    /// The backtest, [`Error::NegZeroBalance`], [`Error::Configuration`] on a partial
    /// model configuration, or [`Error::UnknownColumn`].
    pub fn build(self) -> Result<Backtest> {
        if !self.initial_cash.is_finite() || self.initial_cash <= 0.0 {
            return Err(Error::NegZeroBalance(self.initial_cash));
        }

        let model = match (self.predictor, self.columns, self.rows) {
            (None, None, None) if self.pattern_features => {
                return Err(Error::Configuration("pattern features need a predictor".to_string()));
            }
            (None, None, None) => None,
            (Some(predictor), Some(columns), Some(rows)) => {
                let extractor = WindowExtractor::with_names(&self.series, rows, columns.as_slice())?;
                Some(Model::new(predictor, extractor, self.pattern_features))
            }
            (predictor, columns, rows) => {
                let missing = [
                    ("predictor", predictor.is_none()),
                    ("columns", columns.is_none()),
                    ("rows", rows.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, missing)| missing.then_some(name))
                .collect::<Vec<_>>();
                return Err(Error::Configuration(format!("missing {}", missing.join(", "))));
            }
        };

        Ok(Backtest {
            series: self.series,
            initial_cash: self.initial_cash,
            model,
        })
    }
}

/// Outcome of one run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    trades: Vec<Trade>,
    summary: Summary,
    equity: Vec<(i64, f64)>,
    open_position: Option<Position>,
}

impl Report {
    /// Returns the closed trades, in closing order.
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Returns the summary statistics.
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Returns the cash balance after every close, with the exit time.
    pub fn equity(&self) -> &[(i64, f64)] {
        &self.equity
    }

    /// Returns the position still open at the end of the data, not counted as a trade.
    pub fn open_position(&self) -> Option<&Position> {
        self.open_position.as_ref()
    }

    /// Consumes the report, returning the trades.
    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }
}
