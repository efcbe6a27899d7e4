//! Strategy hook and the per-bar context it receives.

use chrono::{DateTime, NaiveTime};
use tracing::trace;

use crate::engine::{BarSeries, Entry, Position, Side};
use crate::errors::{Error, Result};
use crate::patterns::Ohlc;
use crate::predictor::Model;

/// Decision hook driven by the engine, once per bar.
///
/// Any `FnMut(&mut Context<'_>) -> Result<()>` closure is a strategy.
pub trait Strategy {
    /// One-time setup, called before the first bar.
    fn init(&mut self) {}

    /// Called for every bar with the data visible up to it.
    fn on_data(&mut self, ctx: &mut Context<'_>) -> Result<()>;
}

impl<F> Strategy for F
where
    F: FnMut(&mut Context<'_>) -> Result<()>,
{
    fn on_data(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        self(ctx)
    }
}

/// View of the run at bar `index`.
///
/// Every slice ends at the current bar: later bars are never reachable from here.
#[derive(Debug)]
pub struct Context<'a> {
    index: usize,
    series: &'a BarSeries,
    model: Option<&'a Model>,
    position: Option<&'a Position>,
    request: Option<(Side, Entry)>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(index: usize, series: &'a BarSeries, model: Option<&'a Model>, position: Option<&'a Position>) -> Self {
        Self {
            index,
            series,
            model,
            position,
            request: None,
        }
    }

    pub(crate) fn take_request(&mut self) -> Option<(Side, Entry)> {
        self.request.take()
    }

    /// Returns the index of the current bar.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the visible timestamps.
    pub fn timestamps(&self) -> &'a [i64] {
        &self.series.timestamps()[..=self.index]
    }

    /// Returns the visible open prices.
    pub fn opens(&self) -> &'a [f64] {
        &self.series.opens()[..=self.index]
    }

    /// Returns the visible high prices.
    pub fn highs(&self) -> &'a [f64] {
        &self.series.highs()[..=self.index]
    }

    /// Returns the visible low prices.
    pub fn lows(&self) -> &'a [f64] {
        &self.series.lows()[..=self.index]
    }

    /// Returns the visible close prices.
    pub fn closes(&self) -> &'a [f64] {
        &self.series.closes()[..=self.index]
    }

    /// Returns the timestamp of the current bar.
    pub fn timestamp(&self) -> i64 {
        self.series.timestamps()[self.index]
    }

    /// Returns the prices of the current bar.
    pub fn ohlc(&self) -> Ohlc {
        let i = self.index;
        Ohlc {
            open: self.series.opens()[i],
            high: self.series.highs()[i],
            low: self.series.lows()[i],
            close: self.series.closes()[i],
        }
    }

    /// Returns the last `size` bars, current bar last, or `None` if fewer are visible.
    pub fn window(&self, size: usize) -> Option<Vec<Ohlc>> {
        let start = (self.index + 1).checked_sub(size)?;
        Some(
            (start..=self.index)
                .filter_map(|i| self.series.bar(i))
                .map(|bar| bar.ohlc())
                .collect(),
        )
    }

    /// Returns the visible values of a column (price or engineered feature).
    pub fn feature(&self, name: &str) -> Result<&'a [f64]> {
        let column = self.series.column(name)?;
        self.series
            .values(column)
            .map(|values| &values[..=self.index])
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    /// Returns `true` while a position is open.
    pub fn in_position(&self) -> bool {
        self.position.is_some()
    }

    /// Returns the open position.
    pub fn position(&self) -> Option<&'a Position> {
        self.position
    }

    /// Returns `true` if a model is attached to the backtest.
    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Returns `true` if the attached model expects pattern features.
    pub fn uses_pattern_features(&self) -> bool {
        self.model.is_some_and(Model::pattern_features)
    }

    fn request(&mut self, side: Side, entry: Entry) -> Result<bool> {
        entry.validate()?;
        if self.position.is_some() || self.request.is_some() {
            trace!(index = self.index, ?side, "entry rejected: position already open");
            return Ok(false);
        }
        self.request = Some((side, entry));
        Ok(true)
    }

    /// Requests a long entry.
    ///
    /// ### Returns
    /// `true` if the request was accepted, `false` while a position is open, or
    /// [`Error::InvalidEntry`] on non finite prices.
    pub fn buy(&mut self, entry: Entry) -> Result<bool> {
        self.request(Side::Long, entry)
    }

    /// Requests a short entry. See [`Context::buy`].
    pub fn sell(&mut self, entry: Entry) -> Result<bool> {
        self.request(Side::Short, entry)
    }

    /// Asks the attached model for a prediction at `event_time`.
    ///
    /// The window only covers visible bars.
    ///
    /// ### Returns
    /// The prediction, [`Error::ModelNotSet`] or [`Error::PredictionCardinality`].
    pub fn predict(&self, event_time: i64, extra: Option<&[f64]>) -> Result<f64> {
        let model = self.model.ok_or(Error::ModelNotSet)?;
        model.predict_at(self.series, self.index + 1, event_time, extra)
    }
}

/// Time-of-day bounds, inclusive, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingHours {
    open: NaiveTime,
    close: NaiveTime,
}

impl Default for TradingHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(16, 10, 0).unwrap_or_default(),
        }
    }
}

impl TradingHours {
    /// Creates trading hours, [`Error::Configuration`] if `open` is after `close`.
    pub fn new(open: NaiveTime, close: NaiveTime) -> Result<Self> {
        if open > close {
            return Err(Error::Configuration(format!("market opens at {open} after closing at {close}")));
        }
        Ok(Self { open, close })
    }

    /// Returns the opening time.
    pub fn open(&self) -> NaiveTime {
        self.open
    }

    /// Returns the closing time.
    pub fn close(&self) -> NaiveTime {
        self.close
    }

    /// Returns `true` if the epoch timestamp falls within the bounds.
    pub fn contains(&self, timestamp: i64) -> bool {
        DateTime::from_timestamp(timestamp, 0)
            .map(|date| (self.open..=self.close).contains(&date.time()))
            .unwrap_or(false)
    }
}
