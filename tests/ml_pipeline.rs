use bts_ml::prelude::*;
use ta::{Next, indicators::ExponentialMovingAverage};

/// 2024-01-02 09:30 UTC.
const OPEN: i64 = 1_704_187_800;

/// Blocks of three bars: bearish, bullish engulfing, then a push up to 110.
fn get_data() -> BarSeries {
    let block = [
        (102.0, 102.5, 99.5, 100.0),
        (99.8, 103.5, 99.5, 103.0),
        (103.0, 110.0, 102.0, 109.0),
    ];
    let bars = (0..4)
        .flat_map(|_| block)
        .enumerate()
        .map(|(i, (open, high, low, close))| Bar::from((OPEN + 60 * i as i64, open, high, low, close)))
        .collect::<Vec<_>>();

    let series = BarSeries::new(bars).unwrap();
    let mut ema = ExponentialMovingAverage::new(3).unwrap();
    let values = series.closes().iter().map(|&close| ema.next(close)).collect();
    series.with_feature("ema", values).unwrap()
}

fn engulfing(snapshot: &Snapshot) -> Vec<f64> {
    Pattern::BullishEngulfing.features(snapshot)
}

#[test]
fn pattern_trades_become_training_set() {
    let series = get_data();
    let report = Backtest::new(series.clone(), 1_000.0)
        .unwrap()
        .run(CandlestickStrategy::new(Pattern::BullishEngulfing).with_offsets(5.0, 3.0))
        .unwrap();

    assert_eq!(report.trades().len(), 4);
    assert!(report.trades().iter().all(|t| t.exit() == Exit::TakeProfit));
    assert!(report.open_position().is_none());
    assert_eq!(report.summary().net_profit, 20.0);

    let extractor = WindowExtractor::with_names(&series, 2, &["close", "ema"]).unwrap();
    let set = TrainingSet::from_trades(&series, report.trades(), &extractor, Some(&engulfing))
        .unwrap()
        .round_features(4)
        .cap_labels(10.0);

    assert_eq!(set.len(), 4);
    assert_eq!(set.labels(), &[7.0; 4]);
    assert!(set.dropped().is_empty());

    let ema = series.values(series.column("ema").unwrap()).unwrap();
    let first = &set.features()[0];
    assert_eq!(first.len(), 5);
    assert_eq!(first[0], 100.0);
    assert_eq!(first[2], 103.0);
    assert_eq!(first[3], (ema[1] * 10_000.0).round() / 10_000.0);

    let snapshot = report.trades()[0].metadata().copied().unwrap();
    assert_eq!(first[4], (engulfing(&snapshot)[0] * 10_000.0).round() / 10_000.0);
}

#[test]
fn trained_model_sets_take_profit() {
    let series = get_data();
    let training = Backtest::new(series.clone(), 1_000.0)
        .unwrap()
        .run(CandlestickStrategy::new(Pattern::BullishEngulfing).with_offsets(5.0, 3.0))
        .unwrap();
    let extractor = WindowExtractor::with_names(&series, 2, &["close", "ema"]).unwrap();
    let set = TrainingSet::from_trades(&series, training.trades(), &extractor, Some(&engulfing)).unwrap();

    // mean label regressor, checking rows keep the training layout
    let width = set.features()[0].len();
    let mean = set.labels().iter().sum::<f64>() / set.len() as f64;
    let predictor = move |rows: &[Vec<f64>]| -> Vec<f64> {
        assert!(rows.iter().all(|row| row.len() == width));
        rows.iter().map(|_| mean).collect()
    };

    let backtest = Backtest::builder(series)
        .initial_cash(1_000.0)
        .predictor(predictor)
        .columns(["close", "ema"])
        .rows(2)
        .pattern_features(true)
        .build()
        .unwrap();
    let report = backtest.run(CandlestickStrategy::new(Pattern::BullishEngulfing)).unwrap();

    assert_eq!(report.trades().len(), 4);
    for trade in report.trades() {
        assert_eq!(trade.take_profit(), 110.0);
        assert_eq!(trade.stop_loss(), 103.0 - DEFAULT_STOP_LOSS);
        assert_eq!(trade.exit(), Exit::TakeProfit);
        assert_eq!(trade.pnl(), 7.0);
    }
    assert_eq!(report.summary().final_cash, 1_028.0);
    assert_eq!(report.summary().win_rate, Some(100.0));
}

#[test]
fn closed_session_blocks_entries() {
    let series = get_data();
    let hours = TradingHours::new(
        chrono::NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
        chrono::NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
    )
    .unwrap();
    let report = Backtest::new(series, 1_000.0)
        .unwrap()
        .run(CandlestickStrategy::new(Pattern::BullishEngulfing).with_trading_hours(hours))
        .unwrap();

    assert!(report.trades().is_empty());
    assert_eq!(report.summary().win_rate, None);
    assert_eq!(report.summary().final_cash, 1_000.0);
}
