#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::patterns::Ohlc;

/// Names of the built-in price columns, in column order.
pub const PRICE_COLUMNS: [&str; 4] = ["open", "high", "low", "close"];

/// One OHLC sample of a price series.
///
/// The timestamp is an integer epoch (seconds). Use [`crate::utils::parse_timestamp`]
/// to normalize textual dates before building bars.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl From<(i64, f64, f64, f64, f64)> for Bar {
    fn from((timestamp, open, high, low, close): (i64, f64, f64, f64, f64)) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }
}

impl Bar {
    /// Returns the epoch timestamp.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Returns the open price.
    pub fn open(&self) -> f64 {
        self.open
    }

    /// Returns the high price.
    pub fn high(&self) -> f64 {
        self.high
    }

    /// Returns the low price.
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Returns the close price.
    pub fn close(&self) -> f64 {
        self.close
    }

    /// Checks that every price is finite and the low is not above the high.
    pub fn validate(&self) -> Result<()> {
        let (timestamp, low, high) = (self.timestamp, self.low, self.high);
        if ![self.open, high, low, self.close].iter().all(|p| p.is_finite()) {
            return Err(Error::InvalidBar(format!("non finite price at {timestamp}")));
        }
        if low > high {
            return Err(Error::InvalidBar(format!("low {low} is above high {high} at {timestamp}")));
        }
        Ok(())
    }

    /// Returns the prices without the timestamp.
    pub fn ohlc(&self) -> Ohlc {
        Ohlc {
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
        }
    }
}

/// Builder for [`Bar`], validating every field on `build`.
#[derive(Debug, Default)]
pub struct BarBuilder {
    timestamp: Option<i64>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
}

impl BarBuilder {
    /// Creates an empty builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Sets the epoch timestamp.
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the open price.
    pub fn open(mut self, open: f64) -> Self {
        self.open = Some(open);
        self
    }

    /// Sets the high price.
    pub fn high(mut self, high: f64) -> Self {
        self.high = Some(high);
        self
    }

    /// Sets the low price.
    pub fn low(mut self, low: f64) -> Self {
        self.low = Some(low);
        self
    }

    /// Sets the close price.
    pub fn close(mut self, close: f64) -> Self {
        self.close = Some(close);
        self
    }

    /// Builds the bar.
    ///
    /// ### Returns
    /// The bar, or [`Error::InvalidBar`] if a field is missing, a price is not finite
    /// or the low is above the high.
    pub fn build(self) -> Result<Bar> {
        let missing = |field: &str| Error::InvalidBar(format!("missing `{field}`"));
        let timestamp = self.timestamp.ok_or_else(|| missing("timestamp"))?;
        let open = self.open.ok_or_else(|| missing("open"))?;
        let high = self.high.ok_or_else(|| missing("high"))?;
        let low = self.low.ok_or_else(|| missing("low"))?;
        let close = self.close.ok_or_else(|| missing("close"))?;

        let bar = Bar {
            timestamp,
            open,
            high,
            low,
            close,
        };
        bar.validate()?;
        Ok(bar)
    }
}

/// Handle to a column of a [`BarSeries`], resolved once from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// Open price.
    Open,
    /// High price.
    High,
    /// Low price.
    Low,
    /// Close price.
    Close,
    /// Engineered feature column, by registration order.
    Feature(usize),
}

/// Immutable bar series stored as parallel typed arrays.
///
/// Timestamps are sorted ascending; duplicates are kept in index order.
/// Engineered feature columns (indicators, diffs, ...) are registered by name and
/// must carry one value per bar.
#[derive(Debug, Clone)]
pub struct BarSeries {
    timestamps: Vec<i64>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    features: Vec<(String, Vec<f64>)>,
}

impl BarSeries {
    /// Creates a series from bars sorted by timestamp.
    ///
    /// ### Returns
    /// The series, [`Error::BarDataEmpty`], [`Error::InvalidBar`] or [`Error::UnsortedTimestamps`].
    pub fn new(bars: Vec<Bar>) -> Result<Self> {
        if bars.is_empty() {
            return Err(Error::BarDataEmpty);
        }
        bars.iter().try_for_each(Bar::validate)?;

        if let Some(index) = bars.windows(2).position(|w| w[1].timestamp < w[0].timestamp) {
            return Err(Error::UnsortedTimestamps {
                index: index + 1,
                previous: bars[index].timestamp,
                current: bars[index + 1].timestamp,
            });
        }

        let len = bars.len();
        let mut series = Self {
            timestamps: Vec::with_capacity(len),
            open: Vec::with_capacity(len),
            high: Vec::with_capacity(len),
            low: Vec::with_capacity(len),
            close: Vec::with_capacity(len),
            features: Vec::new(),
        };
        for bar in bars {
            series.timestamps.push(bar.timestamp);
            series.open.push(bar.open);
            series.high.push(bar.high);
            series.low.push(bar.low);
            series.close.push(bar.close);
        }
        Ok(series)
    }

    /// Returns the number of bars.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Returns `true` if the series has no bars (never the case once built).
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Returns the bar at `index`.
    pub fn bar(&self, index: usize) -> Option<Bar> {
        Some(Bar {
            timestamp: *self.timestamps.get(index)?,
            open: self.open[index],
            high: self.high[index],
            low: self.low[index],
            close: self.close[index],
        })
    }

    /// Returns an iterator over the bars.
    pub fn bars(&self) -> impl Iterator<Item = Bar> + '_ {
        (0..self.len()).filter_map(|i| self.bar(i))
    }

    /// Returns the timestamps.
    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    /// Returns the open prices.
    pub fn opens(&self) -> &[f64] {
        &self.open
    }

    /// Returns the high prices.
    pub fn highs(&self) -> &[f64] {
        &self.high
    }

    /// Returns the low prices.
    pub fn lows(&self) -> &[f64] {
        &self.low
    }

    /// Returns the close prices.
    pub fn closes(&self) -> &[f64] {
        &self.close
    }

    /// Returns the first timestamp of the series.
    pub fn start_time(&self) -> i64 {
        self.timestamps.first().copied().unwrap_or_default()
    }

    /// Returns the last timestamp of the series.
    pub fn end_time(&self) -> i64 {
        self.timestamps.last().copied().unwrap_or_default()
    }

    /// Registers an engineered feature column.
    ///
    /// ### Arguments
    /// * `name` - Column name, must not clash with the price columns or an existing feature.
    /// * `values` - One value per bar (`NaN` is allowed for warm-up periods).
    pub fn add_feature(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if PRICE_COLUMNS.contains(&name.as_str()) || self.features.iter().any(|(n, _)| *n == name) {
            return Err(Error::DuplicateColumn(name));
        }
        if values.len() != self.len() {
            return Err(Error::ColumnLength {
                name,
                expected: self.len(),
                got: values.len(),
            });
        }
        self.features.push((name, values));
        Ok(())
    }

    /// Same as [`BarSeries::add_feature`], consuming and returning the series.
    pub fn with_feature(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        self.add_feature(name, values)?;
        Ok(self)
    }

    /// Returns the names of every selectable column.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        PRICE_COLUMNS
            .into_iter()
            .chain(self.features.iter().map(|(name, _)| name.as_str()))
    }

    /// Resolves a column name.
    pub fn column(&self, name: &str) -> Result<Column> {
        match name {
            "open" => Ok(Column::Open),
            "high" => Ok(Column::High),
            "low" => Ok(Column::Low),
            "close" => Ok(Column::Close),
            _ => self
                .features
                .iter()
                .position(|(n, _)| n == name)
                .map(Column::Feature)
                .ok_or_else(|| Error::UnknownColumn(name.to_string())),
        }
    }

    /// Resolves a list of column names, keeping their order.
    pub fn columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Column>> {
        names.iter().map(|name| self.column(name.as_ref())).collect()
    }

    /// Returns the values of a column, or `None` if the handle belongs to another series.
    pub fn values(&self, column: Column) -> Option<&[f64]> {
        match column {
            Column::Open => Some(&self.open),
            Column::High => Some(&self.high),
            Column::Low => Some(&self.low),
            Column::Close => Some(&self.close),
            Column::Feature(index) => self.features.get(index).map(|(_, values)| values.as_slice()),
        }
    }

    /// Returns the highest index whose timestamp is at or before `time`.
    ///
    /// Binary search over the sorted timestamps; ties resolve to the last duplicate.
    pub fn as_of(&self, time: i64) -> Option<usize> {
        as_of(&self.timestamps, time)
    }
}

/// As-of lookup over sorted timestamps: the highest index `j` with `timestamps[j] <= time`.
pub(crate) fn as_of(timestamps: &[i64], time: i64) -> Option<usize> {
    timestamps.partition_point(|&t| t <= time).checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(timestamps: &[i64]) -> BarSeries {
        let bars = timestamps
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                let price = 100.0 + i as f64;
                Bar::from((t, price, price + 1.0, price - 1.0, price + 0.5))
            })
            .collect();
        BarSeries::new(bars).unwrap()
    }

    #[test]
    fn build_bar() {
        let bar = BarBuilder::builder()
            .timestamp(10)
            .open(100.0)
            .high(110.0)
            .low(95.0)
            .close(105.0)
            .build()
            .unwrap();
        assert_eq!(bar.timestamp(), 10);
        assert_eq!(bar.high(), 110.0);
        assert_eq!(bar.ohlc().close, 105.0);
    }

    #[test]
    fn build_bar_missing_field() {
        let result = BarBuilder::builder().timestamp(10).open(1.0).high(2.0).low(0.5).build();
        assert!(matches!(result, Err(Error::InvalidBar(_))));
    }

    #[test]
    fn build_bar_low_above_high() {
        let result = BarBuilder::builder()
            .timestamp(10)
            .open(1.0)
            .high(2.0)
            .low(3.0)
            .close(1.5)
            .build();
        assert!(matches!(result, Err(Error::InvalidBar(_))));
    }

    #[test]
    fn series_rejects_invalid_bars() {
        let bars = vec![Bar::from((10, 1.0, 2.0, 0.5, 1.5)), Bar::from((20, 1.0, 1.0, 3.0, 1.0))];
        assert!(matches!(BarSeries::new(bars), Err(Error::InvalidBar(_))));

        let bars = vec![Bar::from((10, f64::NAN, 2.0, 0.5, 1.5))];
        assert!(matches!(BarSeries::new(bars), Err(Error::InvalidBar(_))));
    }

    #[test]
    fn empty_series() {
        assert!(matches!(BarSeries::new(vec![]), Err(Error::BarDataEmpty)));
    }

    #[test]
    fn unsorted_series() {
        let bars = vec![
            Bar::from((10, 1.0, 1.0, 1.0, 1.0)),
            Bar::from((30, 1.0, 1.0, 1.0, 1.0)),
            Bar::from((20, 1.0, 1.0, 1.0, 1.0)),
        ];
        let result = BarSeries::new(bars);
        assert!(matches!(
            result,
            Err(Error::UnsortedTimestamps {
                index: 2,
                previous: 30,
                current: 20
            })
        ));
    }

    #[test]
    fn as_of_lookup() {
        let series = series(&[10, 20, 30]);
        assert_eq!(series.as_of(5), None);
        assert_eq!(series.as_of(10), Some(0));
        assert_eq!(series.as_of(25), Some(1));
        assert_eq!(series.as_of(30), Some(2));
        assert_eq!(series.as_of(1_000), Some(2));
    }

    #[test]
    fn as_of_duplicates_take_last() {
        let series = series(&[10, 20, 20, 20, 30]);
        assert_eq!(series.as_of(20), Some(3));
        assert_eq!(series.as_of(29), Some(3));
    }

    #[test]
    fn feature_columns() {
        let series = series(&[10, 20, 30]).with_feature("ema_diff", vec![f64::NAN, 0.5, 0.25]).unwrap();
        let column = series.column("ema_diff").unwrap();
        assert_eq!(column, Column::Feature(0));
        assert_eq!(series.values(column).unwrap()[2], 0.25);
        assert_eq!(series.column("close").unwrap(), Column::Close);
        assert_eq!(series.column_names().collect::<Vec<_>>(), ["open", "high", "low", "close", "ema_diff"]);
        assert!(matches!(series.column("rsi"), Err(Error::UnknownColumn(_))));
    }

    #[test]
    fn feature_column_errors() {
        let mut series = series(&[10, 20, 30]);
        assert!(matches!(
            series.add_feature("sma", vec![1.0]),
            Err(Error::ColumnLength { expected: 3, got: 1, .. })
        ));
        assert!(matches!(
            series.add_feature("close", vec![1.0; 3]),
            Err(Error::DuplicateColumn(_))
        ));
        series.add_feature("sma", vec![1.0; 3]).unwrap();
        assert!(matches!(
            series.add_feature("sma", vec![1.0; 3]),
            Err(Error::DuplicateColumn(_))
        ));
        assert!(series.values(Column::Feature(7)).is_none());
    }
}
