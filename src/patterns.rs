//! Candlestick patterns and their feature vectors.
//!
//! Predicates are plain functions over explicit OHLC values. [`Pattern`] bundles a
//! predicate, the number of bars it looks at and the feature function used when a
//! model is fed with pattern features.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Guard added to denominators so flat bars never divide by zero.
const EPSILON: f64 = 0.001;

/// OHLC prices of one bar.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ohlc {
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
}

impl From<(f64, f64, f64, f64)> for Ohlc {
    fn from((open, high, low, close): (f64, f64, f64, f64)) -> Self {
        Self { open, high, low, close }
    }
}

impl Ohlc {
    /// Absolute distance between open and close.
    pub fn body(&self) -> f64 {
        (self.open - self.close).abs()
    }

    /// Distance between the high and the top of the body.
    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    /// Distance between the bottom of the body and the low.
    pub fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    /// Distance between the high and the low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Returns `true` if the bar closed above its open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Returns `true` if the bar closed below its open.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Prices recorded with an entry, used to rebuild pattern features at training time.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    /// Bar on which the entry was taken.
    pub current: Ohlc,
    /// Bar before it, when the pattern needs one.
    pub previous: Option<Ohlc>,
}

impl Snapshot {
    /// Builds a snapshot from a window of bars ending at the entry bar.
    pub fn from_window(window: &[Ohlc]) -> Option<Self> {
        let (current, rest) = window.split_last()?;
        Some(Self {
            current: *current,
            previous: rest.last().copied(),
        })
    }
}

/// Long lower shadow, small body near the high.
pub fn is_hammer(current: &Ohlc) -> bool {
    let range = current.range();
    range > 3.0 * (current.open - current.close)
        && (current.close - current.low) / (EPSILON + range) > 0.6
        && (current.open - current.low) / (EPSILON + range) > 0.6
}

/// Long upper shadow, small body near the low.
pub fn is_inverted_hammer(current: &Ohlc) -> bool {
    let range = current.range();
    range > 3.0 * current.body()
        && current.upper_shadow() / (EPSILON + range) > 0.6
        && current.lower_shadow() / (EPSILON + range) < 0.4
}

/// Almost no body, almost no upper shadow, long lower shadow.
pub fn is_dragonfly_doji(current: &Ohlc) -> bool {
    let range = current.range();
    range > 0.0
        && current.body() / (EPSILON + range) < 0.1
        && current.upper_shadow() / (EPSILON + range) < 0.1
        && current.lower_shadow() / (EPSILON + range) > 0.6
}

/// Bullish body wrapping the previous bearish body.
pub fn is_bullish_engulfing(current: &Ohlc, previous: &Ohlc) -> bool {
    current.close >= previous.open
        && previous.open > previous.close
        && previous.close >= current.open
        && current.close > current.open
        && current.close - current.open > previous.open - previous.close
}

/// Small bullish body inside the previous bearish body.
pub fn is_bullish_harami(current: &Ohlc, previous: &Ohlc) -> bool {
    previous.open > previous.close
        && previous.close <= current.open
        && current.open < current.close
        && current.close <= previous.open
        && current.close - current.open < previous.open - previous.close
}

/// Gap below the previous low closing above the middle of the previous bearish body.
pub fn is_piercing_pattern(current: &Ohlc, previous: &Ohlc) -> bool {
    previous.close < previous.open
        && current.open < previous.low
        && previous.open > current.close
        && current.close > previous.close + (previous.open - previous.close) / 2.0
}

/// Three bar reversal: bearish star above the first body, bullish confirmation.
pub fn is_morning_star(current: &Ohlc, previous: &Ohlc, first: &Ohlc) -> bool {
    let first_top = first.open.max(first.close);
    first_top < previous.close
        && previous.close < previous.open
        && current.close > current.open
        && current.open > first_top
}

/// Morning star whose middle bar is a doji with long shadows on both sides.
pub fn is_morning_star_doji(current: &Ohlc, previous: &Ohlc, first: &Ohlc) -> bool {
    let previous_body = previous.body();
    first.is_bearish()
        && first.body() / (EPSILON + first.range()) >= 0.7
        && previous_body / (EPSILON + previous.range()) < 0.1
        && current.is_bullish()
        && current.body() / (EPSILON + current.range()) >= 0.7
        && first.close > previous.close
        && first.close > previous.open
        && previous.close < current.open
        && previous.open < current.open
        && current.close > first.close
        && previous.upper_shadow() > 3.0 * previous_body
        && previous.lower_shadow() > 3.0 * previous_body
}

/// Body, upper shadow, lower shadow and range of a bar.
pub fn basic_features(current: &Ohlc) -> Vec<f64> {
    vec![
        current.body(),
        current.upper_shadow(),
        current.lower_shadow(),
        current.range(),
    ]
}

/// Upper shadow to body ratio and body to range ratio.
pub fn inverted_hammer_features(current: &Ohlc) -> Vec<f64> {
    let body = current.body();
    vec![
        current.upper_shadow() / (body + EPSILON),
        body / (current.range() + EPSILON),
    ]
}

/// Current body over previous body, `0.0` when the previous bar is flat.
pub fn engulfing_ratio(current: &Ohlc, previous: &Ohlc) -> f64 {
    let previous_body = previous.body();
    if previous_body == 0.0 {
        0.0
    } else {
        current.body() / previous_body
    }
}

/// Supported candlestick patterns.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// Hammer at the bottom of a down move.
    Hammer,
    /// Inverted hammer at the bottom of a down move.
    InvertedHammer,
    /// Dragonfly doji.
    DragonflyDoji,
    /// Bullish engulfing.
    BullishEngulfing,
    /// Bullish harami.
    BullishHarami,
    /// Piercing pattern.
    PiercingPattern,
    /// Morning star.
    MorningStar,
    /// Morning star doji.
    MorningStarDoji,
}

impl Pattern {
    /// Every pattern, for sweeps.
    pub const ALL: [Pattern; 8] = [
        Pattern::Hammer,
        Pattern::InvertedHammer,
        Pattern::DragonflyDoji,
        Pattern::BullishEngulfing,
        Pattern::BullishHarami,
        Pattern::PiercingPattern,
        Pattern::MorningStar,
        Pattern::MorningStarDoji,
    ];

    /// Number of bars (current included) the pattern looks at.
    pub fn bars(&self) -> usize {
        match self {
            Self::DragonflyDoji => 1,
            Self::MorningStar | Self::MorningStarDoji => 3,
            _ => 2,
        }
    }

    /// Detects the pattern on a window ending at the current bar.
    ///
    /// Windows shorter than [`Pattern::bars`] never match.
    pub fn detect(&self, window: &[Ohlc]) -> bool {
        if window.len() < self.bars() {
            return false;
        }
        let n = window.len();
        let current = &window[n - 1];
        match self {
            // the hammers only count after a lower close
            Self::Hammer => is_hammer(current) && current.close < window[n - 2].close,
            Self::InvertedHammer => is_inverted_hammer(current) && current.close < window[n - 2].close,
            Self::DragonflyDoji => is_dragonfly_doji(current),
            Self::BullishEngulfing => is_bullish_engulfing(current, &window[n - 2]),
            Self::BullishHarami => is_bullish_harami(current, &window[n - 2]),
            Self::PiercingPattern => is_piercing_pattern(current, &window[n - 2]),
            Self::MorningStar => is_morning_star(current, &window[n - 2], &window[n - 3]),
            Self::MorningStarDoji => is_morning_star_doji(current, &window[n - 2], &window[n - 3]),
        }
    }

    /// Feature vector fed to a model alongside the lookback window.
    pub fn features(&self, snapshot: &Snapshot) -> Vec<f64> {
        let current = &snapshot.current;
        match (self, snapshot.previous.as_ref()) {
            (Self::InvertedHammer, _) => inverted_hammer_features(current),
            (Self::BullishEngulfing | Self::BullishHarami, Some(previous)) => {
                vec![engulfing_ratio(current, previous)]
            }
            (Self::BullishEngulfing | Self::BullishHarami, None) => vec![0.0],
            _ => basic_features(current),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hammer() {
        let bar = Ohlc::from((99.0, 100.0, 90.0, 99.5));
        assert!(is_hammer(&bar));
        assert!(!is_hammer(&Ohlc::from((90.0, 100.0, 89.0, 99.0))));
    }

    #[test]
    fn hammer_needs_lower_close() {
        let previous = Ohlc::from((101.0, 102.0, 100.0, 101.0));
        let current = Ohlc::from((99.0, 100.0, 90.0, 99.5));
        assert!(Pattern::Hammer.detect(&[previous, current]));

        let previous = Ohlc::from((95.0, 96.0, 94.0, 95.0));
        assert!(!Pattern::Hammer.detect(&[previous, current]));
        assert!(!Pattern::Hammer.detect(&[current]));
    }

    #[test]
    fn inverted_hammer() {
        let bar = Ohlc::from((91.0, 100.0, 90.0, 90.5));
        assert!(is_inverted_hammer(&bar));
        assert!(!is_inverted_hammer(&Ohlc::from((90.0, 100.0, 89.0, 99.0))));
    }

    #[test]
    fn dragonfly_doji() {
        assert!(is_dragonfly_doji(&Ohlc::from((100.0, 100.2, 90.0, 100.1))));
        assert!(!is_dragonfly_doji(&Ohlc::from((100.0, 100.0, 100.0, 100.0))));
    }

    #[test]
    fn bullish_engulfing() {
        let previous = Ohlc::from((105.0, 106.0, 99.0, 100.0));
        let current = Ohlc::from((99.0, 108.0, 98.0, 107.0));
        assert!(is_bullish_engulfing(&current, &previous));
        assert!(!is_bullish_engulfing(&previous, &current));
        assert!(Pattern::BullishEngulfing.detect(&[previous, current]));
    }

    #[test]
    fn bullish_harami() {
        let previous = Ohlc::from((110.0, 111.0, 99.0, 100.0));
        let current = Ohlc::from((102.0, 106.0, 101.0, 105.0));
        assert!(is_bullish_harami(&current, &previous));
    }

    #[test]
    fn piercing_pattern() {
        let previous = Ohlc::from((110.0, 111.0, 99.0, 100.0));
        let current = Ohlc::from((97.0, 108.0, 96.0, 107.0));
        assert!(is_piercing_pattern(&current, &previous));
        let shallow = Ohlc::from((97.0, 104.0, 96.0, 103.0));
        assert!(!is_piercing_pattern(&shallow, &previous));
    }

    #[test]
    fn morning_star() {
        let first = Ohlc::from((100.0, 101.0, 94.0, 95.0));
        let previous = Ohlc::from((103.0, 104.0, 101.0, 102.0));
        let current = Ohlc::from((103.0, 110.0, 102.0, 109.0));
        assert!(is_morning_star(&current, &previous, &first));
        assert!(Pattern::MorningStar.detect(&[first, previous, current]));
        assert!(!Pattern::MorningStar.detect(&[previous, current]));
    }

    #[test]
    fn morning_star_doji() {
        let first = Ohlc::from((110.0, 110.5, 99.5, 100.0));
        let previous = Ohlc::from((95.0, 97.0, 93.0, 95.1));
        let current = Ohlc::from((96.0, 112.5, 95.5, 112.0));
        assert!(is_morning_star_doji(&current, &previous, &first));
    }

    #[test]
    fn pattern_features() {
        let snapshot = Snapshot {
            current: Ohlc::from((99.0, 108.0, 98.0, 107.0)),
            previous: Some(Ohlc::from((105.0, 106.0, 99.0, 100.0))),
        };
        assert_eq!(Pattern::BullishEngulfing.features(&snapshot), vec![8.0 / 5.0]);
        assert_eq!(Pattern::Hammer.features(&snapshot), vec![8.0, 1.0, 1.0, 10.0]);
        assert_eq!(Pattern::InvertedHammer.features(&snapshot).len(), 2);
    }

    #[test]
    fn engulfing_ratio_flat_previous() {
        let flat = Ohlc::from((100.0, 101.0, 99.0, 100.0));
        let current = Ohlc::from((99.0, 108.0, 98.0, 107.0));
        assert_eq!(engulfing_ratio(&current, &flat), 0.0);
    }

    #[test]
    fn snapshot_from_window() {
        let a = Ohlc::from((1.0, 2.0, 0.5, 1.5));
        let b = Ohlc::from((1.5, 2.5, 1.0, 2.0));
        let snapshot = Snapshot::from_window(&[a, b]).unwrap();
        assert_eq!(snapshot.current, b);
        assert_eq!(snapshot.previous, Some(a));
        assert_eq!(Snapshot::from_window(&[a]).unwrap().previous, None);
        assert!(Snapshot::from_window(&[]).is_none());
    }
}
