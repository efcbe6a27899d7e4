//! Strategy parameter optimization.
//!
//! This module provides tools to optimize trading strategies by testing different parameter combinations.
//! The `Optimizer` struct runs one backtest per combination, in parallel, while the
//! `ParameterCombination` trait defines how to generate parameter sets.

use std::marker::PhantomData;

use rayon::prelude::*;

use crate::engine::{Backtest, Report};
use crate::errors::Result;
use crate::metrics::Summary;
use crate::strategy::Strategy;

/// Trait defining how to generate parameter combinations for optimization.
///
/// Implement this trait for your parameter types to define how combinations should be generated.
/// The associated type `Output` represents a single parameter combination (e.g., a tuple of values).
pub trait ParameterCombination: Sync {
    /// Type representing a single parameter combination (e.g., `(usize, f64)`).
    type Output: Clone + Send + Sync;

    /// Generates all possible parameter combinations to test.
    ///
    /// # Returns
    /// A vector containing all parameter combinations.
    fn generate() -> Vec<Self::Output>;
}

/// Optimizer for testing trading strategies with different parameter combinations.
///
/// Every combination gets a fresh strategy and its own run; only the backtest
/// inputs (bars, cash, model) are shared.
pub struct Optimizer<PC: ParameterCombination> {
    backtest: Backtest,
    _marker: PhantomData<PC>,
}

impl<PC: ParameterCombination> From<&Backtest> for Optimizer<PC> {
    fn from(value: &Backtest) -> Self {
        Self::new(value.clone())
    }
}

impl<PC: ParameterCombination> Optimizer<PC> {
    /// Creates a new `Optimizer` over a configured backtest.
    pub fn new(backtest: Backtest) -> Self {
        Self {
            backtest,
            _marker: PhantomData,
        }
    }

    /// Optimizes a trading strategy by testing all parameter combinations.
    ///
    /// # Arguments
    /// * `combinator` - Function that builds the strategy of a parameter combination.
    ///
    /// # Returns
    /// Each parameter combination with the summary of its run, in generation order.
    ///
    /// # Errors
    /// Returns the first error raised by a combinator or a run.
    pub fn with<S, C>(&self, combinator: C) -> Result<Vec<(PC::Output, Summary)>>
    where
        S: Strategy,
        C: Fn(&PC::Output) -> Result<S> + Sync,
    {
        self.with_filter(combinator, |_, report| Some(report.summary().clone()))
    }

    /// Same as [`Optimizer::with`], keeping only what `filter` extracts from each report.
    ///
    /// # Arguments
    /// * `combinator` - Function that builds the strategy of a parameter combination.
    /// * `filter` - Maps a report to a result, `None` drops the combination.
    pub fn with_filter<S, C, F, T>(&self, combinator: C, filter: F) -> Result<Vec<(PC::Output, T)>>
    where
        S: Strategy,
        C: Fn(&PC::Output) -> Result<S> + Sync,
        F: Fn(&PC::Output, &Report) -> Option<T> + Sync,
        T: Send,
    {
        let num_cpus = num_cpus::get();
        let combinations = PC::generate();
        let chunk_size = combinations.len().div_ceil(num_cpus).max(1);
        let backtest = &self.backtest;

        combinations
            .par_chunks(chunk_size)
            .map::<_, Result<_>>(|par_combinations| {
                let mut local_results = Vec::with_capacity(par_combinations.len());

                for param_set in par_combinations {
                    let strategy = combinator(param_set)?;
                    let report = backtest.run(strategy)?;
                    if let Some(output) = filter(param_set, &report) {
                        local_results.push((param_set.clone(), output));
                    }
                }

                Ok(local_results)
            })
            .collect::<Result<Vec<_>>>()
            .map(|chunks| chunks.into_iter().flatten().collect())
    }
}
