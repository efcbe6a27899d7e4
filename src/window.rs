//! As-of lookback windows.
//!
//! Every event timestamp is aligned to the last bar at or before it, and the
//! selected columns of the `rows` bars ending there are flattened bar-major into
//! one feature row. Events older than the first bar produce no row: the
//! [`Extraction`] keeps a per-event `matched` mask so sibling arrays (labels,
//! targets, ...) can be filtered the same way with [`Extraction::filter_aligned`].

use tracing::debug;

use crate::engine::{BarSeries, as_of};
use crate::errors::{Error, Result};

/// Lookback size and column selection used to build feature rows.
///
/// Columns are kept by name and resolved against the series each row is built
/// from, so one extractor can serve series that registered their features in a
/// different order.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowExtractor {
    rows: usize,
    columns: Vec<String>,
}

impl WindowExtractor {
    /// Creates an extractor.
    ///
    /// ### Arguments
    /// * `rows` - Number of bars in the lookback window, current bar included.
    /// * `columns` - Names of the columns to flatten (price columns or engineered features).
    ///
    /// ### Returns
    /// The extractor, or [`Error::Configuration`] on an empty window or selection.
    pub fn new<I, S>(rows: usize, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = columns.into_iter().map(Into::into).collect::<Vec<String>>();
        if rows == 0 {
            return Err(Error::Configuration("lookback rows must be at least 1".to_string()));
        }
        if columns.is_empty() {
            return Err(Error::Configuration("no feature column selected".to_string()));
        }
        Ok(Self { rows, columns })
    }

    /// Same as [`WindowExtractor::new`], checking every name exists in `series`.
    ///
    /// ### Returns
    /// The extractor, [`Error::Configuration`] or [`Error::UnknownColumn`].
    pub fn with_names<S: AsRef<str>>(series: &BarSeries, rows: usize, names: &[S]) -> Result<Self> {
        series.columns(names)?;
        Self::new(rows, names.iter().map(|name| name.as_ref().to_string()))
    }

    /// Returns the lookback size.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the selected column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Width of a row before extra features are appended.
    pub fn width(&self) -> usize {
        self.rows * self.columns.len()
    }

    /// Builds the row of one event, looking only at `series[..upto]`.
    ///
    /// Returns `Ok(None)` when no visible bar is at or before `event_time`, or
    /// [`Error::UnknownColumn`] if `series` lacks a selected column.
    pub(crate) fn row_upto(
        &self,
        series: &BarSeries,
        upto: usize,
        event_time: i64,
        extra: Option<&[f64]>,
    ) -> Result<Option<Vec<f64>>> {
        let upto = upto.min(series.len());
        let Some(end) = as_of(&series.timestamps()[..upto], event_time) else {
            return Ok(None);
        };
        let start = (end + 1).saturating_sub(self.rows);

        let columns = self
            .columns
            .iter()
            .map(|name| {
                let column = series.column(name)?;
                series.values(column).ok_or_else(|| Error::UnknownColumn(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let extra = extra.unwrap_or_default();
        let mut row = Vec::with_capacity((end + 1 - start) * columns.len() + extra.len());
        for index in start..=end {
            row.extend(columns.iter().map(|values| values[index]));
        }
        row.extend_from_slice(extra);
        Ok(Some(row))
    }

    /// Builds the row of one event over the whole series.
    pub fn row(&self, series: &BarSeries, event_time: i64, extra: Option<&[f64]>) -> Result<Option<Vec<f64>>> {
        self.row_upto(series, series.len(), event_time, extra)
    }

    /// Builds one row per event that aligns to a bar.
    ///
    /// ### Arguments
    /// * `series` - Bars to look back into.
    /// * `events` - Event timestamps, in any order.
    /// * `extra` - Optional vectors appended to the row of the event with the same index.
    ///
    /// ### Returns
    /// The surviving rows, in event order, with the per-event matched mask.
    pub fn extract(&self, series: &BarSeries, events: &[i64], extra: Option<&[Vec<f64>]>) -> Result<Extraction> {
        let mut rows = Vec::with_capacity(events.len());
        let mut matched = Vec::with_capacity(events.len());

        for (index, &event_time) in events.iter().enumerate() {
            let extra = extra.and_then(|extra| extra.get(index)).map(Vec::as_slice);
            match self.row(series, event_time, extra)? {
                Some(row) => {
                    rows.push(row);
                    matched.push(true);
                }
                None => {
                    debug!(index, event_time, "event before the first bar, skipped");
                    matched.push(false);
                }
            }
        }

        Ok(Extraction { rows, matched })
    }
}

/// Feature rows of the matched events plus the per-event matched mask.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    rows: Vec<Vec<f64>>,
    matched: Vec<bool>,
}

impl Extraction {
    /// Returns the rows of the matched events.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Consumes the extraction, returning its rows.
    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows
    }

    /// One flag per input event, `true` when it produced a row.
    pub fn matched(&self) -> &[bool] {
        &self.matched
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if no event matched.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Indexes of the events that produced no row.
    pub fn dropped(&self) -> Vec<usize> {
        self.matched
            .iter()
            .enumerate()
            .filter_map(|(index, &matched)| (!matched).then_some(index))
            .collect()
    }

    /// Keeps the values of `labels` whose event produced a row.
    ///
    /// ### Returns
    /// Values aligned with [`Extraction::rows`], or [`Error::LabelLength`] if
    /// `labels` does not have one value per input event.
    pub fn filter_aligned<T: Clone>(&self, labels: &[T]) -> Result<Vec<T>> {
        if labels.len() != self.matched.len() {
            return Err(Error::LabelLength {
                expected: self.matched.len(),
                got: labels.len(),
            });
        }
        Ok(labels
            .iter()
            .zip(&self.matched)
            .filter_map(|(label, &matched)| matched.then(|| label.clone()))
            .collect())
    }
}

/// Builds the feature rows of `events` in one call.
///
/// ### Arguments
/// * `series` - Bars to look back into.
/// * `events` - Event timestamps.
/// * `lookback_rows` - Number of bars per window.
/// * `columns` - Column names, price columns or engineered features.
/// * `extra` - Optional vectors appended per event index.
///
/// ### Example
/// ```rust
/// use bts_ml::prelude::*;
///
/// let bars = vec![
///     Bar::from((10, 1.0, 2.0, 0.5, 1.5)),
///     Bar::from((20, 1.5, 2.5, 1.0, 2.0)),
///     Bar::from((30, 2.0, 3.0, 1.5, 2.5)),
/// ];
/// let series = BarSeries::new(bars).unwrap();
/// let extraction = extract(&series, &[25, 5], 2, &["close"], None).unwrap();
/// assert_eq!(extraction.rows(), &[vec![1.5, 2.0]]);
/// assert_eq!(extraction.matched(), &[true, false]);
/// ```
pub fn extract<S: AsRef<str>>(
    series: &BarSeries,
    events: &[i64],
    lookback_rows: usize,
    columns: &[S],
    extra: Option<&[Vec<f64>]>,
) -> Result<Extraction> {
    WindowExtractor::with_names(series, lookback_rows, columns)?.extract(series, events, extra)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Bar;

    fn series(timestamps: &[i64]) -> BarSeries {
        let bars = timestamps
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                let close = (i + 1) as f64;
                Bar::from((t, close - 0.5, close + 1.0, close - 1.0, close))
            })
            .collect();
        BarSeries::new(bars).unwrap()
    }

    #[test]
    fn as_of_alignment() {
        let series = series(&[10, 20, 30]);
        let extraction = extract(&series, &[25, 5], 1, &["close"], None).unwrap();
        // t=25 aligns to the bar at t=20
        assert_eq!(extraction.rows(), &[vec![2.0]]);
        assert_eq!(extraction.matched(), &[true, false]);
        assert_eq!(extraction.dropped(), vec![1]);
    }

    #[test]
    fn lookback_truncation() {
        let series = series(&[10, 20, 30, 40]);
        let extraction = extract(&series, &[20], 5, &["close"], None).unwrap();
        assert_eq!(extraction.rows(), &[vec![1.0, 2.0]]);
    }

    #[test]
    fn bar_major_flattening() {
        let series = series(&[10, 20, 30]);
        let extraction = extract(&series, &[30], 2, &["close", "high"], None).unwrap();
        assert_eq!(extraction.rows(), &[vec![2.0, 3.0, 3.0, 4.0]]);
    }

    #[test]
    fn feature_column_and_extra() {
        let series = series(&[10, 20, 30]).with_feature("diff", vec![0.1, 0.2, 0.3]).unwrap();
        let extra = vec![vec![7.0, 8.0]];
        let extraction = extract(&series, &[30, 20], 1, &["diff"], Some(&extra)).unwrap();
        // the second event has no extra vector
        assert_eq!(extraction.rows(), &[vec![0.3, 7.0, 8.0], vec![0.2]]);
    }

    #[test]
    fn duplicates_take_last() {
        let series = series(&[10, 20, 20, 30]);
        let extraction = extract(&series, &[20], 1, &["close"], None).unwrap();
        assert_eq!(extraction.rows(), &[vec![3.0]]);
    }

    #[test]
    fn visible_prefix_only() {
        let series = series(&[10, 20, 20, 30]);
        let extractor = WindowExtractor::with_names(&series, 1, &["close"]).unwrap();
        // only the first two bars are visible: the later duplicate is ignored
        let row = extractor.row_upto(&series, 2, 20, None).unwrap();
        assert_eq!(row, Some(vec![2.0]));
        assert_eq!(extractor.row_upto(&series, 0, 20, None).unwrap(), None);
    }

    #[test]
    fn filter_labels() {
        let series = series(&[10, 20, 30]);
        let extraction = extract(&series, &[5, 15, 1, 30], 1, &["close"], None).unwrap();
        let labels = extraction.filter_aligned(&["a", "b", "c", "d"]).unwrap();
        assert_eq!(labels, vec!["b", "d"]);
        assert_eq!(labels.len(), extraction.len());
        assert!(matches!(
            extraction.filter_aligned(&[1, 2]),
            Err(Error::LabelLength { expected: 4, got: 2 })
        ));
    }

    #[test]
    fn columns_follow_names_across_series() {
        let first = series(&[10, 20, 30]).with_feature("ema", vec![100.0, 200.0, 300.0]).unwrap();
        let second = series(&[10, 20, 30])
            .with_feature("rsi", vec![-1.0, -2.0, -3.0])
            .unwrap()
            .with_feature("ema", vec![100.0, 200.0, 300.0])
            .unwrap();
        let extractor = WindowExtractor::with_names(&first, 1, &["ema"]).unwrap();
        assert_eq!(extractor.row(&second, 30, None).unwrap(), Some(vec![300.0]));

        // a series without the column is refused
        let plain = series(&[10, 20, 30]);
        assert!(matches!(extractor.row(&plain, 30, None), Err(Error::UnknownColumn(_))));
    }

    #[test]
    fn invalid_configuration() {
        let series = series(&[10]);
        assert!(matches!(
            WindowExtractor::with_names(&series, 0, &["close"]),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            WindowExtractor::new(3, Vec::<String>::new()),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            extract(&series, &[10], 1, &["volume"], None),
            Err(Error::UnknownColumn(_))
        ));
    }
}
