#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::position::{Exit, Position, Side};
use crate::patterns::Snapshot;

/// Size of every trade: the simulation trades a single unit.
pub const TRADE_SIZE: f64 = 1.0;

/// A closed position. Never mutated once appended to the trade log.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trade {
    id: usize,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    side: Side,
    #[cfg_attr(feature = "serde", serde(rename = "entry price"))]
    entry_price: f64,
    #[cfg_attr(feature = "serde", serde(rename = "take profit"))]
    take_profit: f64,
    #[cfg_attr(feature = "serde", serde(rename = "stop loss"))]
    stop_loss: f64,
    #[cfg_attr(feature = "serde", serde(rename = "entry time"))]
    entry_time: i64,
    #[cfg_attr(feature = "serde", serde(rename = "highest high"))]
    highest_high: f64,
    target: f64,
    #[cfg_attr(feature = "serde", serde(rename = "exit price"))]
    exit_price: f64,
    #[cfg_attr(feature = "serde", serde(rename = "exit time"))]
    exit_time: i64,
    #[cfg_attr(feature = "serde", serde(rename = "exit reason"))]
    exit: Exit,
    size: f64,
    pnl: f64,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    metadata: Option<Snapshot>,
}

impl Trade {
    /// Closes `position` at `exit_price`.
    pub(crate) fn close(id: usize, position: &Position, exit: Exit, exit_price: f64, exit_time: i64) -> Self {
        Self {
            id,
            exit,
            exit_price,
            exit_time,
            side: position.side(),
            entry_price: position.entry_price(),
            take_profit: position.take_profit(),
            stop_loss: position.stop_loss(),
            entry_time: position.entry_time(),
            highest_high: position.highest_high(),
            target: position.target(),
            size: TRADE_SIZE,
            pnl: position.pnl(exit_price) * TRADE_SIZE,
            metadata: position.metadata().copied(),
        }
    }

    /// Returns the trade number within its run, starting at 1.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the side.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Returns the entry price.
    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    /// Returns the take-profit price.
    pub fn take_profit(&self) -> f64 {
        self.take_profit
    }

    /// Returns the stop-loss price.
    pub fn stop_loss(&self) -> f64 {
        self.stop_loss
    }

    /// Returns the entry time.
    pub fn entry_time(&self) -> i64 {
        self.entry_time
    }

    /// Returns the highest high seen while the position was open.
    pub fn highest_high(&self) -> f64 {
        self.highest_high
    }

    /// Highest high since entry minus the entry price, the label used for training.
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Returns the exit price.
    pub fn exit_price(&self) -> f64 {
        self.exit_price
    }

    /// Returns the exit time.
    pub fn exit_time(&self) -> i64 {
        self.exit_time
    }

    /// Returns the exit rule that closed the position.
    pub fn exit(&self) -> Exit {
        self.exit
    }

    /// Returns the traded size.
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Returns the realized profit or loss.
    pub fn pnl(&self) -> f64 {
        self.pnl
    }

    /// Returns the metadata snapshot recorded at entry.
    pub fn metadata(&self) -> Option<&Snapshot> {
        self.metadata.as_ref()
    }
}

#[cfg(test)]
#[test]
fn close_short_position() {
    let entry = (100.0, 90.0, 104.0, 7).into();
    let mut position = Position::open(Side::Short, entry, 3, 101.0);
    position.update(103.0);
    let trade = Trade::close(1, &position, Exit::TakeProfit, 90.0, 9);

    assert_eq!(trade.id(), 1);
    assert_eq!(trade.side(), Side::Short);
    assert_eq!(trade.entry_time(), 7);
    assert_eq!(trade.exit_time(), 9);
    assert_eq!(trade.size(), 1.0);
    assert_eq!(trade.pnl(), 10.0);
    assert_eq!(trade.target(), 3.0);
    assert!(trade.metadata().is_none());
}
