//! Training sets built from a trade log.
//!
//! Each trade becomes one example: the lookback window at its entry time (plus the
//! pattern features of its metadata snapshot) and its target, the highest high
//! reached while open minus the entry price. Rows and labels are filtered with the
//! same matched mask, so they always line up.

use tracing::debug;

use crate::engine::{BarSeries, Trade};
use crate::errors::{Error, Result};
use crate::patterns::Snapshot;
use crate::window::WindowExtractor;

/// Feature rows and their labels.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    features: Vec<Vec<f64>>,
    labels: Vec<f64>,
    events: Vec<usize>,
    dropped: Vec<usize>,
}

impl TrainingSet {
    /// Builds the examples of a trade log.
    ///
    /// ### Arguments
    /// * `series` - Bars (and feature columns) the trades were simulated on.
    /// * `trades` - The trade log.
    /// * `extractor` - Lookback size and columns of the rows.
    /// * `pattern` - Optional pattern features computed from each trade's snapshot.
    ///
    /// ### Returns
    /// The training set, or [`Error::MissingMetadata`] if pattern features are asked
    /// for a trade without snapshot.
    ///
    /// ### Example
    /// ```rust
    /// use bts_ml::prelude::*;
    ///
    /// let bars = vec![
    ///     Bar::from((1, 100.0, 101.0, 99.0, 100.0)),
    ///     Bar::from((2, 100.0, 106.0, 99.0, 105.0)),
    /// ];
    /// let series = BarSeries::new(bars).unwrap();
    /// let report = Backtest::new(series.clone(), 1_000.0)
    ///     .unwrap()
    ///     .run(|ctx: &mut Context<'_>| -> Result<()> {
    ///         let close = ctx.ohlc().close;
    ///         ctx.buy((close, close + 5.0, close - 5.0, ctx.timestamp()).into())?;
    ///         Ok(())
    ///     })
    ///     .unwrap();
    ///
    /// let extractor = WindowExtractor::with_names(&series, 2, &["close"]).unwrap();
    /// let set = TrainingSet::from_trades(&series, report.trades(), &extractor, None).unwrap();
    /// assert_eq!(set.features(), &[vec![100.0]]);
    /// assert_eq!(set.labels(), &[6.0]);
    /// ```
    pub fn from_trades(
        series: &BarSeries,
        trades: &[Trade],
        extractor: &WindowExtractor,
        pattern: Option<&dyn Fn(&Snapshot) -> Vec<f64>>,
    ) -> Result<Self> {
        let events = trades.iter().map(Trade::entry_time).collect::<Vec<_>>();
        let extra = match pattern {
            Some(features) => Some(
                trades
                    .iter()
                    .map(|trade| trade.metadata().map(features).ok_or(Error::MissingMetadata(trade.id())))
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => None,
        };

        let extraction = extractor.extract(series, &events, extra.as_deref())?;
        let targets = trades.iter().map(Trade::target).collect::<Vec<_>>();
        let labels = extraction.filter_aligned(&targets)?;
        let indexes = (0..trades.len()).collect::<Vec<_>>();
        let events = extraction.filter_aligned(&indexes)?;
        let dropped = extraction.dropped();
        if !dropped.is_empty() {
            debug!(dropped = dropped.len(), "trades without window skipped");
        }

        Ok(Self {
            features: extraction.into_rows(),
            labels,
            events,
            dropped,
        })
    }

    /// Caps every label at `upper`.
    pub fn cap_labels(mut self, upper: f64) -> Self {
        self.labels.iter_mut().for_each(|label| *label = label.min(upper));
        self
    }

    /// Rounds every feature to `decimals` decimal places.
    pub fn round_features(mut self, decimals: i32) -> Self {
        let factor = 10f64.powi(decimals);
        self.features
            .iter_mut()
            .flatten()
            .for_each(|value| *value = (*value * factor).round() / factor);
        self
    }

    /// Drops the examples whose row holds a non finite value (indicator warm-up).
    pub fn drop_incomplete(mut self) -> Self {
        let mut kept = Self {
            dropped: std::mem::take(&mut self.dropped),
            ..Self::default()
        };
        let rows = self.features.into_iter().zip(self.labels).zip(self.events);
        for ((row, label), event) in rows {
            if row.iter().all(|value| value.is_finite()) {
                kept.features.push(row);
                kept.labels.push(label);
                kept.events.push(event);
            } else {
                kept.dropped.push(event);
            }
        }
        kept.dropped.sort_unstable();
        kept
    }

    /// Returns the feature rows.
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Returns the labels, one per row.
    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    /// Index in the trade log of each example.
    pub fn events(&self) -> &[usize] {
        &self.events
    }

    /// Indexes in the trade log of the trades without example.
    pub fn dropped(&self) -> &[usize] {
        &self.dropped
    }

    /// Returns the number of examples.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` if there is no example.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Consumes the set, returning rows and labels.
    pub fn into_parts(self) -> (Vec<Vec<f64>>, Vec<f64>) {
        (self.features, self.labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Backtest, Bar, Entry};
    use crate::patterns::{Ohlc, Pattern};
    use crate::strategy::Context;

    fn series() -> BarSeries {
        BarSeries::new(vec![
            Bar::from((10, 100.0, 101.0, 99.0, 100.0)),
            Bar::from((20, 100.0, 102.0, 98.0, 101.0)),
            Bar::from((30, 101.0, 107.0, 100.0, 106.0)),
            Bar::from((40, 106.0, 107.0, 95.0, 96.0)),
            Bar::from((50, 96.0, 102.0, 95.0, 101.0)),
        ])
        .unwrap()
    }

    /// Long every time flat, 5 above and below the close.
    fn trades(series: &BarSeries, entry_time: impl Fn(i64) -> i64) -> Vec<Trade> {
        Backtest::new(series.clone(), 1_000.0)
            .unwrap()
            .run(|ctx: &mut Context<'_>| -> Result<()> {
                let close = ctx.ohlc().close;
                let window = ctx.window(1).unwrap_or_default();
                let mut entry: Entry = (close, close + 5.0, close - 5.0, entry_time(ctx.timestamp())).into();
                if let Some(snapshot) = Snapshot::from_window(&window) {
                    entry = entry.with_metadata(snapshot);
                }
                ctx.buy(entry)?;
                Ok(())
            })
            .unwrap()
            .into_trades()
    }

    #[test]
    fn rows_and_labels() {
        let series = series();
        let trades = trades(&series, |t| t);
        assert_eq!(trades.len(), 2);

        let extractor = WindowExtractor::with_names(&series, 2, &["close"]).unwrap();
        let set = TrainingSet::from_trades(&series, &trades, &extractor, None).unwrap();
        // entered at t=10 (exits t=30, highest high 107), then at t=40 (exits t=50)
        assert_eq!(set.features(), &[vec![100.0], vec![106.0, 96.0]]);
        assert_eq!(set.labels(), &[7.0, 11.0]);
        assert_eq!(set.events(), &[0, 1]);
        assert!(set.dropped().is_empty());

        let set = set.cap_labels(10.0);
        assert_eq!(set.labels(), &[7.0, 10.0]);
    }

    #[test]
    fn unmatched_trades_keep_labels_aligned() {
        let series = series();
        // the first entry is stamped before the first bar
        let trades = trades(&series, |t| if t == 10 { 5 } else { t });
        let extractor = WindowExtractor::with_names(&series, 1, &["close"]).unwrap();
        let set = TrainingSet::from_trades(&series, &trades, &extractor, None).unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.features(), &[vec![96.0]]);
        assert_eq!(set.labels(), &[trades[1].target()]);
        assert_eq!(set.dropped(), &[0]);
    }

    #[test]
    fn pattern_features() {
        let series = series();
        let trades = trades(&series, |t| t);
        let extractor = WindowExtractor::with_names(&series, 1, &["close"]).unwrap();
        let features = |snapshot: &Snapshot| Pattern::Hammer.features(snapshot);
        let set = TrainingSet::from_trades(&series, &trades, &extractor, Some(&features)).unwrap();

        let first = Ohlc::from((100.0, 101.0, 99.0, 100.0));
        let mut expected = vec![100.0];
        expected.extend(Pattern::Hammer.features(&Snapshot::from_window(&[first]).unwrap()));
        assert_eq!(set.features()[0], expected);
    }

    #[test]
    fn missing_metadata() {
        let series = series();
        let trades = Backtest::new(series.clone(), 1_000.0)
            .unwrap()
            .run(|ctx: &mut Context<'_>| -> Result<()> {
                let close = ctx.ohlc().close;
                ctx.buy((close, close + 5.0, close - 5.0, ctx.timestamp()).into())?;
                Ok(())
            })
            .unwrap()
            .into_trades();
        let extractor = WindowExtractor::with_names(&series, 1, &["close"]).unwrap();
        let features = |snapshot: &Snapshot| Pattern::Hammer.features(snapshot);
        let result = TrainingSet::from_trades(&series, &trades, &extractor, Some(&features));
        assert!(matches!(result, Err(Error::MissingMetadata(1))));
    }

    #[test]
    fn rounding_and_incomplete_rows() {
        let series = series().with_feature("ema", vec![f64::NAN, 1.0, 2.0, 3.23456, 4.0]).unwrap();
        let trades = trades(&series, |t| t);
        let extractor = WindowExtractor::with_names(&series, 2, &["ema"]).unwrap();
        let set = TrainingSet::from_trades(&series, &trades, &extractor, None)
            .unwrap()
            .round_features(4)
            .drop_incomplete();

        // the first window is all warm-up
        assert_eq!(set.dropped(), &[0]);
        assert_eq!(set.features(), &[vec![2.0, 3.2346]]);
        assert_eq!(set.events(), &[1]);
    }
}
