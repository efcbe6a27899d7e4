//! Ready-made strategies.

use crate::PercentCalculus;
use crate::engine::Entry;
use crate::errors::Result;
use crate::patterns::{Pattern, Snapshot};
use crate::strategy::{Context, Strategy, TradingHours};

/// Take-profit distance used without a model.
pub const DEFAULT_TAKE_PROFIT: f64 = 50.0;
/// Stop-loss distance.
pub const DEFAULT_STOP_LOSS: f64 = 37.0;

/// Goes long at the close of a bar completing a candlestick pattern.
///
/// Without a model the take-profit sits a fixed distance above the close; with one
/// it is the close plus the predicted move. Entries outside the trading hours are
/// skipped (09:30 to 16:10 UTC unless configured).
#[derive(Debug, Clone, PartialEq)]
pub struct CandlestickStrategy {
    pattern: Pattern,
    hours: Option<TradingHours>,
    take_profit: f64,
    stop_loss: f64,
}

impl CandlestickStrategy {
    /// Creates the strategy of a pattern.
    pub fn new(pattern: Pattern) -> Self {
        Self {
            pattern,
            hours: None,
            take_profit: DEFAULT_TAKE_PROFIT,
            stop_loss: DEFAULT_STOP_LOSS,
        }
    }

    /// Sets the trading hours.
    pub fn with_trading_hours(mut self, hours: TradingHours) -> Self {
        self.hours = Some(hours);
        self
    }

    /// Sets the take-profit and stop-loss distances from the close.
    pub fn with_offsets(mut self, take_profit: f64, stop_loss: f64) -> Self {
        self.take_profit = take_profit;
        self.stop_loss = stop_loss;
        self
    }

    /// Returns the pattern.
    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    /// Returns the trading hours, set by `init` when absent.
    pub fn trading_hours(&self) -> Option<TradingHours> {
        self.hours
    }
}

impl Strategy for CandlestickStrategy {
    fn init(&mut self) {
        self.hours.get_or_insert_with(TradingHours::default);
    }

    fn on_data(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if ctx.in_position() {
            return Ok(());
        }
        if let Some(hours) = self.hours
            && !hours.contains(ctx.timestamp())
        {
            return Ok(());
        }
        let Some(window) = ctx.window(self.pattern.bars()) else {
            return Ok(());
        };
        if !self.pattern.detect(&window) {
            return Ok(());
        }
        let Some(snapshot) = Snapshot::from_window(&window) else {
            return Ok(());
        };

        let time = ctx.timestamp();
        let price = snapshot.current.close;
        let take_profit = if ctx.has_model() {
            let extra = ctx.uses_pattern_features().then(|| self.pattern.features(&snapshot));
            price + ctx.predict(time, extra.as_deref())?
        } else {
            price + self.take_profit
        };
        let stop_loss = price - self.stop_loss;

        let entry = Entry::from((price, take_profit, stop_loss, time)).with_metadata(snapshot);
        ctx.buy(entry)?;
        Ok(())
    }
}

/// Long on a green bar, short on a red bar, exits a fixed percentage away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumStrategy {
    percent: f64,
}

impl Default for MomentumStrategy {
    fn default() -> Self {
        Self { percent: 5.0 }
    }
}

impl MomentumStrategy {
    /// Creates the strategy with exits `percent` % away from the close.
    pub fn new(percent: f64) -> Self {
        Self { percent }
    }
}

impl Strategy for MomentumStrategy {
    fn on_data(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if ctx.in_position() {
            return Ok(());
        }
        let bar = ctx.ohlc();
        let (close, time) = (bar.close, ctx.timestamp());
        let up = close.addpercent(self.percent);
        let down = close.subpercent(self.percent);

        if bar.is_bullish() {
            ctx.buy((close, up, down, time).into())?;
        } else if bar.is_bearish() {
            ctx.sell((close, down, up, time).into())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Bar, BarSeries, Side};

    // 2024-01-02 10:00:00 UTC
    const MORNING: i64 = 1_704_189_600;

    fn engulfing_series(start: i64) -> BarSeries {
        BarSeries::new(vec![
            Bar::from((start, 105.0, 106.0, 99.0, 100.0)),
            Bar::from((start + 60, 99.0, 108.0, 98.0, 107.0)),
        ])
        .unwrap()
    }

    #[test]
    fn candlestick_entry() {
        let series = engulfing_series(MORNING);
        let mut strategy = CandlestickStrategy::new(Pattern::BullishEngulfing);
        strategy.init();
        assert_eq!(strategy.trading_hours(), Some(TradingHours::default()));

        let mut ctx = Context::new(0, &series, None, None);
        strategy.on_data(&mut ctx).unwrap();
        assert!(ctx.take_request().is_none());

        let mut ctx = Context::new(1, &series, None, None);
        strategy.on_data(&mut ctx).unwrap();
        let (side, entry) = ctx.take_request().unwrap();
        assert_eq!(side, Side::Long);
        assert_eq!(entry.price, 107.0);
        assert_eq!(entry.take_profit, 157.0);
        assert_eq!(entry.stop_loss, 70.0);
        assert_eq!(entry.entry_time, MORNING + 60);
        assert_eq!(entry.metadata.unwrap().previous.unwrap().close, 100.0);
    }

    #[test]
    fn candlestick_outside_hours() {
        // 2024-01-02 20:00:00 UTC
        let series = engulfing_series(MORNING + 10 * 3600);
        let mut strategy = CandlestickStrategy::new(Pattern::BullishEngulfing);
        strategy.init();
        let mut ctx = Context::new(1, &series, None, None);
        strategy.on_data(&mut ctx).unwrap();
        assert!(ctx.take_request().is_none());
    }

    #[test]
    fn momentum_sides() {
        let series = BarSeries::new(vec![
            Bar::from((10, 100.0, 101.0, 99.0, 100.5)),
            Bar::from((20, 100.0, 101.0, 99.0, 99.5)),
            Bar::from((30, 100.0, 101.0, 99.0, 100.0)),
        ])
        .unwrap();
        let mut strategy = MomentumStrategy::default();

        let mut ctx = Context::new(0, &series, None, None);
        strategy.on_data(&mut ctx).unwrap();
        let (side, entry) = ctx.take_request().unwrap();
        assert_eq!(side, Side::Long);
        assert!(entry.take_profit > entry.price && entry.stop_loss < entry.price);

        let mut ctx = Context::new(1, &series, None, None);
        strategy.on_data(&mut ctx).unwrap();
        let (side, entry) = ctx.take_request().unwrap();
        assert_eq!(side, Side::Short);
        assert!(entry.take_profit < entry.price && entry.stop_loss > entry.price);

        // doji: no trade
        let mut ctx = Context::new(2, &series, None, None);
        strategy.on_data(&mut ctx).unwrap();
        assert!(ctx.take_request().is_none());
    }
}
