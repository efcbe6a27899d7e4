//! Performance statistics for backtesting.
//!
//! [`Statistics`] is the running simulation state folded at every trade close:
//! - cash balance, equity peak and max drawdown
//! - win/loss/even counters per side
//! - gross profit and gross loss
//!
//! [`Summary`] is its final, serializable form. Field names follow the trade
//! report tables consumed by downstream tooling (`"# of long wins"`, `"profit factor"`, ...).
//! Ratios that divide by zero are `None` and render as `undefined`, never `0`.

use std::fmt;

use crate::engine::{Side, Trade};

/// Win/loss/even counters of one side.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcomes {
    /// Trades closed with a positive P&L.
    pub wins: usize,
    /// Trades closed with a negative P&L.
    pub loses: usize,
    /// Trades closed flat.
    pub evens: usize,
}

impl Outcomes {
    fn record(&mut self, pnl: f64) {
        if pnl > 0.0 {
            self.wins += 1;
        } else if pnl < 0.0 {
            self.loses += 1;
        } else {
            self.evens += 1;
        }
    }
}

/// Running state of one simulation run.
///
/// Owned by a single run and mutated only when a trade closes.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    initial_cash: f64,
    cash: f64,
    equity_peak: f64,
    max_drawdown: f64,
    long: Outcomes,
    short: Outcomes,
    gross_profit: f64,
    gross_loss: f64,
    trades: usize,
}

impl Statistics {
    /// Creates the state of a run starting with `initial_cash`.
    pub fn new(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            equity_peak: initial_cash,
            max_drawdown: 0.0,
            long: Outcomes::default(),
            short: Outcomes::default(),
            gross_profit: 0.0,
            gross_loss: 0.0,
            trades: 0,
        }
    }

    /// Folds a whole trade log, in order.
    pub fn from_trades<'a>(initial_cash: f64, trades: impl IntoIterator<Item = &'a Trade>) -> Self {
        trades.into_iter().fold(Self::new(initial_cash), |mut stats, trade| {
            stats.record(trade.side(), trade.pnl());
            stats
        })
    }

    /// Folds one closed trade.
    pub fn record(&mut self, side: Side, pnl: f64) {
        match side {
            Side::Long => self.long.record(pnl),
            Side::Short => self.short.record(pnl),
        }
        if pnl > 0.0 {
            self.gross_profit += pnl;
        } else if pnl < 0.0 {
            self.gross_loss += pnl;
        }

        self.cash += pnl;
        if self.cash > self.equity_peak {
            self.equity_peak = self.cash;
        } else {
            let drawdown = self.equity_peak - self.cash;
            self.max_drawdown = self.max_drawdown.max(drawdown);
        }
        self.trades += 1;
    }

    /// Returns the initial cash.
    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    /// Returns the cash balance.
    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Returns the highest cash balance seen.
    pub fn equity_peak(&self) -> f64 {
        self.equity_peak
    }

    /// Returns the largest drop from an equity peak, in cash.
    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    /// Returns the long side counters.
    pub fn long(&self) -> Outcomes {
        self.long
    }

    /// Returns the short side counters.
    pub fn short(&self) -> Outcomes {
        self.short
    }

    /// Returns the sum of positive P&L.
    pub fn gross_profit(&self) -> f64 {
        self.gross_profit
    }

    /// Returns the sum of negative P&L (zero or negative).
    pub fn gross_loss(&self) -> f64 {
        self.gross_loss
    }

    /// Returns the number of closed trades.
    pub fn trades(&self) -> usize {
        self.trades
    }

    /// Returns the total wins.
    pub fn wins(&self) -> usize {
        self.long.wins + self.short.wins
    }

    /// Returns the total losses.
    pub fn loses(&self) -> usize {
        self.long.loses + self.short.loses
    }

    /// Wins over decided trades, as a percentage. `None` without a win or a loss.
    pub fn win_rate(&self) -> Option<f64> {
        let decided = self.wins() + self.loses();
        (decided > 0).then(|| self.wins() as f64 / decided as f64 * 100.0)
    }

    /// Gross profit over absolute gross loss. `None` without any loss.
    pub fn profit_factor(&self) -> Option<f64> {
        (self.gross_loss != 0.0).then(|| self.gross_profit / self.gross_loss.abs())
    }

    /// Gross profit plus gross loss.
    pub fn net_profit(&self) -> f64 {
        self.gross_profit + self.gross_loss
    }

    /// Builds the summary of a run spanning `start_time..=end_time`.
    pub fn summary(&self, start_time: i64, end_time: i64) -> Summary {
        Summary {
            start_time,
            end_time,
            trades: self.trades,
            wins: self.wins(),
            loses: self.loses(),
            win_rate: self.win_rate(),
            long_wins: self.long.wins,
            long_loses: self.long.loses,
            long_evens: self.long.evens,
            short_wins: self.short.wins,
            short_loses: self.short.loses,
            short_evens: self.short.evens,
            net_profit: self.net_profit(),
            max_drawdown: self.max_drawdown,
            gross_profit: self.gross_profit,
            gross_loss: self.gross_loss,
            profit_factor: self.profit_factor(),
            initial_cash: self.initial_cash,
            final_cash: self.cash,
        }
    }
}

/// Final statistics of a run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// First bar timestamp.
    #[cfg_attr(feature = "serde", serde(rename = "start time"))]
    pub start_time: i64,
    /// Last bar timestamp.
    #[cfg_attr(feature = "serde", serde(rename = "end time"))]
    pub end_time: i64,
    /// Closed trades.
    #[cfg_attr(feature = "serde", serde(rename = "# of trades"))]
    pub trades: usize,
    /// Winning trades.
    #[cfg_attr(feature = "serde", serde(rename = "# of wins"))]
    pub wins: usize,
    /// Losing trades.
    #[cfg_attr(feature = "serde", serde(rename = "# of loses"))]
    pub loses: usize,
    /// Percentage of wins over wins and losses.
    #[cfg_attr(feature = "serde", serde(rename = "win rate"))]
    pub win_rate: Option<f64>,
    /// Winning long trades.
    #[cfg_attr(feature = "serde", serde(rename = "# of long wins"))]
    pub long_wins: usize,
    /// Losing long trades.
    #[cfg_attr(feature = "serde", serde(rename = "# of long loses"))]
    pub long_loses: usize,
    /// Flat long trades.
    #[cfg_attr(feature = "serde", serde(rename = "# of long evens"))]
    pub long_evens: usize,
    /// Winning short trades.
    #[cfg_attr(feature = "serde", serde(rename = "# of short wins"))]
    pub short_wins: usize,
    /// Losing short trades.
    #[cfg_attr(feature = "serde", serde(rename = "# of short loses"))]
    pub short_loses: usize,
    /// Flat short trades.
    #[cfg_attr(feature = "serde", serde(rename = "# of short evens"))]
    pub short_evens: usize,
    /// Gross profit plus gross loss.
    #[cfg_attr(feature = "serde", serde(rename = "net profit"))]
    pub net_profit: f64,
    /// Largest drop from an equity peak, in cash.
    #[cfg_attr(feature = "serde", serde(rename = "max drawdown"))]
    pub max_drawdown: f64,
    /// Sum of positive P&L.
    #[cfg_attr(feature = "serde", serde(rename = "gross profit"))]
    pub gross_profit: f64,
    /// Sum of negative P&L.
    #[cfg_attr(feature = "serde", serde(rename = "gross loss"))]
    pub gross_loss: f64,
    /// Gross profit over absolute gross loss.
    #[cfg_attr(feature = "serde", serde(rename = "profit factor"))]
    pub profit_factor: Option<f64>,
    /// Cash at the start of the run.
    #[cfg_attr(feature = "serde", serde(rename = "initial cash"))]
    pub initial_cash: f64,
    /// Cash at the end of the run.
    #[cfg_attr(feature = "serde", serde(rename = "final cash"))]
    pub final_cash: f64,
}

fn ratio(value: Option<f64>, suffix: &str) -> String {
    value.map_or_else(|| "undefined".to_string(), |v| format!("{v:.2}{suffix}"))
}

impl Summary {
    /// Key/value rows of the transposed summary table.
    pub fn table(&self) -> Vec<(&'static str, String)> {
        vec![
            ("start time", self.start_time.to_string()),
            ("end time", self.end_time.to_string()),
            ("# of trades", self.trades.to_string()),
            ("# of wins", self.wins.to_string()),
            ("# of loses", self.loses.to_string()),
            ("win rate", ratio(self.win_rate, "%")),
            ("# of long wins", self.long_wins.to_string()),
            ("# of long loses", self.long_loses.to_string()),
            ("# of long evens", self.long_evens.to_string()),
            ("# of short wins", self.short_wins.to_string()),
            ("# of short loses", self.short_loses.to_string()),
            ("# of short evens", self.short_evens.to_string()),
            ("net profit", format!("{:.2}", self.net_profit)),
            ("max drawdown", format!("-{:.2}", self.max_drawdown)),
            ("gross profit", format!("{:.2}", self.gross_profit)),
            ("gross loss", format!("{:.2}", self.gross_loss)),
            ("profit factor", ratio(self.profit_factor, "")),
        ]
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Backtest Summary ===")?;
        writeln!(f, "Initial Cash: {:.2}", self.initial_cash)?;
        writeln!(f, "Final Cash: {:.2}", self.final_cash)?;
        #[allow(clippy::writeln_empty_string)]
        writeln!(f, "")?;
        for (key, value) in self.table() {
            writeln!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[test]
fn max_drawdown() {
    let mut stats = Statistics::new(10_000.0);
    stats.record(Side::Long, 2_000.0); // peak 12000
    stats.record(Side::Long, -3_000.0); // 9000
    stats.record(Side::Short, 2_000.0); // 11000
    assert_eq!(stats.equity_peak(), 12_000.0);
    assert_eq!(stats.max_drawdown(), 3_000.0);
    assert_eq!(stats.cash(), 11_000.0);
}

#[cfg(test)]
#[test]
fn max_drawdown_no_trades() {
    let stats = Statistics::new(10_000.0);
    assert_eq!(stats.max_drawdown(), 0.0);
}

#[cfg(test)]
#[test]
fn counters_by_side() {
    let mut stats = Statistics::new(100.0);
    stats.record(Side::Long, 5.0);
    stats.record(Side::Long, -2.0);
    stats.record(Side::Long, 0.0);
    stats.record(Side::Short, 3.0);
    stats.record(Side::Short, -1.0);

    assert_eq!(
        stats.long(),
        Outcomes {
            wins: 1,
            loses: 1,
            evens: 1
        }
    );
    assert_eq!(
        stats.short(),
        Outcomes {
            wins: 1,
            loses: 1,
            evens: 0
        }
    );
    assert_eq!(stats.trades(), 5);
    assert_eq!(stats.gross_profit(), 8.0);
    assert_eq!(stats.gross_loss(), -3.0);
    assert_eq!(stats.net_profit(), 5.0);
    assert_eq!(stats.win_rate(), Some(50.0));
}

#[cfg(test)]
#[test]
fn profit_factor() {
    let mut stats = Statistics::new(100.0);
    stats.record(Side::Long, 20.0);
    stats.record(Side::Long, -10.0);
    assert_eq!(stats.profit_factor(), Some(2.0));
}

#[cfg(test)]
#[test]
fn profit_factor_no_losses() {
    let mut stats = Statistics::new(100.0);
    stats.record(Side::Long, 20.0);
    assert_eq!(stats.gross_loss(), 0.0);
    assert_eq!(stats.profit_factor(), None);
    assert_eq!(stats.win_rate(), Some(100.0));
}

#[cfg(test)]
#[test]
fn undefined_ratios() {
    let stats = Statistics::new(100.0);
    assert_eq!(stats.win_rate(), None);
    assert_eq!(stats.profit_factor(), None);

    // evens only: still no decided trade
    let mut stats = Statistics::new(100.0);
    stats.record(Side::Short, 0.0);
    assert_eq!(stats.win_rate(), None);

    let table = stats.summary(0, 1).table();
    assert!(table.contains(&("win rate", "undefined".to_string())));
    assert!(table.contains(&("profit factor", "undefined".to_string())));
}

#[cfg(test)]
#[test]
fn all_losses_is_not_undefined() {
    let mut stats = Statistics::new(100.0);
    stats.record(Side::Long, -4.0);
    assert_eq!(stats.win_rate(), Some(0.0));
    assert_eq!(stats.profit_factor(), Some(0.0));
}

#[cfg(test)]
#[test]
fn summary_table() {
    let mut stats = Statistics::new(1_000.0);
    stats.record(Side::Long, 12.5);
    stats.record(Side::Short, -2.5);
    let summary = stats.summary(100, 200);

    assert_eq!(summary.final_cash, 1_010.0);
    let table = summary.table();
    assert_eq!(table.len(), 17);
    assert_eq!(table[0], ("start time", "100".to_string()));
    assert!(table.contains(&("win rate", "50.00%".to_string())));
    assert!(table.contains(&("max drawdown", "-2.50".to_string())));
    assert!(table.contains(&("profit factor", "5.00".to_string())));
    assert!(summary.to_string().contains("# of short loses: 1"));
}
