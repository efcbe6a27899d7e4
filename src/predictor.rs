//! Predictor seam.
//!
//! The engine treats the model as opaque: it builds a feature matrix with the
//! configured [`WindowExtractor`] and expects exactly one value back.

use std::{fmt, sync::Arc};

use crate::engine::BarSeries;
use crate::errors::{Error, Result};
use crate::window::WindowExtractor;

/// Single-output inference over a feature matrix.
///
/// Implemented for closures `Fn(&[Vec<f64>]) -> Vec<f64>`, so a trained model can be
/// plugged in as `move |rows| model.predict(rows)`.
pub trait Predictor: Send + Sync {
    /// Predicts one value per row.
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>>;
}

impl<F> Predictor for F
where
    F: Fn(&[Vec<f64>]) -> Vec<f64> + Send + Sync,
{
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        Ok(self(features))
    }
}

/// A predictor with its lookback window configuration.
#[derive(Clone)]
pub struct Model {
    predictor: Arc<dyn Predictor>,
    extractor: WindowExtractor,
    pattern_features: bool,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("extractor", &self.extractor)
            .field("pattern_features", &self.pattern_features)
            .finish_non_exhaustive()
    }
}

impl Model {
    /// Creates a model.
    ///
    /// ### Arguments
    /// * `predictor` - The inference call.
    /// * `extractor` - Lookback size and columns of the feature rows.
    /// * `pattern_features` - Whether strategies append pattern features to the rows.
    pub fn new(predictor: Arc<dyn Predictor>, extractor: WindowExtractor, pattern_features: bool) -> Self {
        Self {
            predictor,
            extractor,
            pattern_features,
        }
    }

    /// Returns the window extractor.
    pub fn extractor(&self) -> &WindowExtractor {
        &self.extractor
    }

    /// Returns `true` if rows carry pattern features.
    pub fn pattern_features(&self) -> bool {
        self.pattern_features
    }

    /// Predicts the value of one event looking only at `series[..upto]`.
    ///
    /// ### Returns
    /// The prediction, [`Error::EmptyWindow`] if no visible bar is at or before
    /// `event_time` (the predictor is not called), or [`Error::PredictionCardinality`]
    /// if the predictor did not return exactly one value.
    pub fn predict_at(&self, series: &BarSeries, upto: usize, event_time: i64, extra: Option<&[f64]>) -> Result<f64> {
        let row = self
            .extractor
            .row_upto(series, upto, event_time, extra)?
            .ok_or(Error::EmptyWindow(event_time))?;
        match self.predictor.predict(&[row])?.as_slice() {
            [value] => Ok(*value),
            values => Err(Error::PredictionCardinality(values.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Bar;

    fn series() -> BarSeries {
        BarSeries::new(vec![
            Bar::from((10, 1.0, 2.0, 0.5, 1.5)),
            Bar::from((20, 1.5, 2.5, 1.0, 2.0)),
            Bar::from((30, 2.0, 3.0, 1.5, 2.5)),
        ])
        .unwrap()
    }

    fn with_predictor<P: Predictor + 'static>(predictor: P) -> Model {
        let extractor = WindowExtractor::new(2, ["close"]).unwrap();
        Model::new(Arc::new(predictor), extractor, false)
    }

    #[test]
    fn sum_of_window() {
        let model = with_predictor(|rows: &[Vec<f64>]| -> Vec<f64> { rows.iter().map(|row| row.iter().sum()).collect() });
        assert_eq!(model.predict_at(&series(), 3, 30, None).unwrap(), 4.5);
        // bar at t=30 is not visible yet
        assert_eq!(model.predict_at(&series(), 2, 30, None).unwrap(), 3.5);
        assert_eq!(model.predict_at(&series(), 3, 30, Some(&[10.0])).unwrap(), 14.5);
    }

    #[test]
    fn cardinality() {
        let model = with_predictor(|_: &[Vec<f64>]| vec![1.0, 2.0]);
        assert!(matches!(
            model.predict_at(&series(), 3, 30, None),
            Err(Error::PredictionCardinality(2))
        ));

        let model = with_predictor(|_: &[Vec<f64>]| -> Vec<f64> { Vec::new() });
        assert!(matches!(
            model.predict_at(&series(), 3, 30, None),
            Err(Error::PredictionCardinality(0))
        ));
    }

    #[test]
    fn no_window_before_first_bar() {
        let model = with_predictor(|_: &[Vec<f64>]| vec![7.0]);
        assert!(matches!(model.predict_at(&series(), 3, 5, None), Err(Error::EmptyWindow(5))));
        // nothing visible yet
        assert!(matches!(model.predict_at(&series(), 0, 30, None), Err(Error::EmptyWindow(30))));
        assert_eq!(model.predict_at(&series(), 1, 30, None).unwrap(), 7.0);
    }

    struct Failing;

    impl Predictor for Failing {
        fn predict(&self, _: &[Vec<f64>]) -> Result<Vec<f64>> {
            Err(Error::Msg("model not fitted".to_string()))
        }
    }

    #[test]
    fn predictor_error_propagates() {
        let model = with_predictor(Failing);
        assert!(matches!(model.predict_at(&series(), 3, 30, None), Err(Error::Msg(_))));
    }
}
