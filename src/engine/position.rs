#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::patterns::Snapshot;

/// Represents the side of a position (long or short).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Profits when the price goes up.
    Long,
    /// Profits when the price goes down.
    Short,
}

/// Which exit rule closed a position.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exit {
    /// The stop-loss price was breached.
    StopLoss,
    /// The take-profit price was reached.
    TakeProfit,
}

/// Entry request issued by a strategy through `buy` or `sell`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry {
    /// Entry price.
    pub price: f64,
    /// Take-profit price.
    pub take_profit: f64,
    /// Stop-loss price.
    pub stop_loss: f64,
    /// Entry time (epoch).
    pub entry_time: i64,
    /// Prices recorded for pattern features.
    pub metadata: Option<Snapshot>,
}

type E1 = (f64, f64, f64, i64);
impl From<E1> for Entry {
    fn from((price, take_profit, stop_loss, entry_time): E1) -> Self {
        Self {
            price,
            take_profit,
            stop_loss,
            entry_time,
            metadata: None,
        }
    }
}

impl Entry {
    /// Attaches the metadata snapshot.
    pub fn with_metadata(mut self, metadata: Snapshot) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let prices = [
            ("price", self.price),
            ("take profit", self.take_profit),
            ("stop loss", self.stop_loss),
        ];
        match prices.iter().find(|(_, p)| !p.is_finite()) {
            Some((name, value)) => Err(Error::InvalidEntry(format!("{name} is {value}"))),
            None => Ok(()),
        }
    }
}

/// An open trade and its exit conditions.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    side: Side,
    entry_price: f64,
    entry_time: i64,
    entry_index: usize,
    stop_loss: f64,
    take_profit: f64,
    metadata: Option<Snapshot>,
    highest_high: f64,
}

impl Position {
    /// Opens a position on the bar at `entry_index` whose high is `high`.
    pub(crate) fn open(side: Side, entry: Entry, entry_index: usize, high: f64) -> Self {
        Self {
            side,
            entry_index,
            entry_price: entry.price,
            entry_time: entry.entry_time,
            stop_loss: entry.stop_loss,
            take_profit: entry.take_profit,
            metadata: entry.metadata,
            highest_high: high,
        }
    }

    /// Returns the side.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Returns the entry price.
    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    /// Returns the entry time.
    pub fn entry_time(&self) -> i64 {
        self.entry_time
    }

    /// Returns the index of the bar the position was opened on.
    pub fn entry_index(&self) -> usize {
        self.entry_index
    }

    /// Returns the stop-loss price.
    pub fn stop_loss(&self) -> f64 {
        self.stop_loss
    }

    /// Returns the take-profit price.
    pub fn take_profit(&self) -> f64 {
        self.take_profit
    }

    /// Returns the metadata snapshot.
    pub fn metadata(&self) -> Option<&Snapshot> {
        self.metadata.as_ref()
    }

    /// Returns the highest high seen since entry (entry bar included).
    pub fn highest_high(&self) -> f64 {
        self.highest_high
    }

    /// Distance between the highest high since entry and the entry price.
    pub fn target(&self) -> f64 {
        self.highest_high - self.entry_price
    }

    /// Records the high of a new bar.
    pub(crate) fn update(&mut self, high: f64) {
        if high > self.highest_high {
            self.highest_high = high;
        }
    }

    /// Checks the exit rules against a bar's high and low.
    ///
    /// The stop-loss is checked first: a bar breaching both levels exits at the stop-loss.
    pub fn resolve(&self, high: f64, low: f64) -> Option<(Exit, f64)> {
        match self.side {
            Side::Long => {
                if low <= self.stop_loss {
                    Some((Exit::StopLoss, self.stop_loss))
                } else if high >= self.take_profit {
                    Some((Exit::TakeProfit, self.take_profit))
                } else {
                    None
                }
            }
            Side::Short => {
                if high >= self.stop_loss {
                    Some((Exit::StopLoss, self.stop_loss))
                } else if low <= self.take_profit {
                    Some((Exit::TakeProfit, self.take_profit))
                } else {
                    None
                }
            }
        }
    }

    /// Profit or loss of one unit exited at `exit_price`.
    pub fn pnl(&self, exit_price: f64) -> f64 {
        match self.side {
            Side::Long => exit_price - self.entry_price,
            Side::Short => self.entry_price - exit_price,
        }
    }
}

#[cfg(test)]
fn long(price: f64, take_profit: f64, stop_loss: f64) -> Position {
    Position::open(Side::Long, (price, take_profit, stop_loss, 0).into(), 0, price)
}

#[cfg(test)]
fn short(price: f64, take_profit: f64, stop_loss: f64) -> Position {
    Position::open(Side::Short, (price, take_profit, stop_loss, 0).into(), 0, price)
}

#[cfg(test)]
#[test]
fn long_take_profit() {
    let position = long(100.0, 105.0, 95.0);
    assert_eq!(position.resolve(104.0, 96.0), None);
    assert_eq!(position.resolve(105.0, 96.0), Some((Exit::TakeProfit, 105.0)));
    assert_eq!(position.pnl(105.0), 5.0);
}

#[cfg(test)]
#[test]
fn long_stop_loss() {
    let position = long(100.0, 105.0, 95.0);
    assert_eq!(position.resolve(101.0, 95.0), Some((Exit::StopLoss, 95.0)));
    assert_eq!(position.pnl(95.0), -5.0);
}

#[cfg(test)]
#[test]
fn short_exits() {
    let position = short(100.0, 95.0, 105.0);
    assert_eq!(position.resolve(104.0, 96.0), None);
    assert_eq!(position.resolve(104.0, 95.0), Some((Exit::TakeProfit, 95.0)));
    assert_eq!(position.resolve(105.0, 96.0), Some((Exit::StopLoss, 105.0)));
    assert_eq!(position.pnl(95.0), 5.0);
    assert_eq!(position.pnl(105.0), -5.0);
}

#[cfg(test)]
#[test]
fn stop_loss_wins_ties() {
    // one wide bar breaches both levels
    let position = long(100.0, 105.0, 95.0);
    assert_eq!(position.resolve(110.0, 90.0), Some((Exit::StopLoss, 95.0)));

    let position = short(100.0, 95.0, 105.0);
    assert_eq!(position.resolve(110.0, 90.0), Some((Exit::StopLoss, 105.0)));
}

#[cfg(test)]
#[test]
fn highest_high_only_rises() {
    let mut position = long(100.0, 120.0, 90.0);
    position.update(104.0);
    position.update(102.0);
    assert_eq!(position.highest_high(), 104.0);
    assert_eq!(position.target(), 4.0);
}

#[cfg(test)]
#[test]
fn invalid_entry() {
    let entry: Entry = (100.0, f64::NAN, 95.0, 0).into();
    assert!(matches!(entry.validate(), Err(Error::InvalidEntry(_))));
    let entry: Entry = (100.0, 105.0, 95.0, 0).into();
    assert!(entry.validate().is_ok());
}
