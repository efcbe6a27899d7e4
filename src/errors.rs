/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading bars, configuring or running a backtest.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The bar data provided is empty. Backtesting requires at least one bar.
    #[error("Bar data is empty: backtesting requires at least one bar")]
    BarDataEmpty,

    /// Bar timestamps must be sorted ascending (duplicates are allowed).
    #[error("Bar timestamps must be sorted ascending: bar {index} has {current} after {previous}")]
    UnsortedTimestamps {
        /// Index of the offending bar.
        index: usize,
        /// Timestamp of the bar before it.
        previous: i64,
        /// Timestamp of the offending bar.
        current: i64,
    },

    /// A bar could not be built (missing field, non finite price, low above high).
    #[error("Invalid bar: {0}")]
    InvalidBar(String),

    /// A timestamp is neither an epoch integer nor the supported date format.
    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    /// The initial balance is not positive. Trading requires a positive balance.
    #[error("Balance must be positive (got: {0})")]
    NegZeroBalance(f64),

    /// The column name does not exist in the bar series.
    #[error("Unknown column: {0:?}")]
    UnknownColumn(String),

    /// A feature column with the same name is already registered.
    #[error("Duplicate column: {0:?}")]
    DuplicateColumn(String),

    /// A feature column does not have one value per bar.
    #[error("Column {name:?} has {got} values, expected {expected}")]
    ColumnLength {
        /// Column name.
        name: String,
        /// Number of bars in the series.
        expected: usize,
        /// Number of values provided.
        got: usize,
    },

    /// The predictor configuration is incomplete or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The predictor returned zero or more than one value for a single event.
    #[error("Prediction must yield exactly one value (got: {0})")]
    PredictionCardinality(usize),

    /// A prediction was requested for an event before the first visible bar.
    #[error("No bar at or before {0} to build a prediction window")]
    EmptyWindow(i64),

    /// A prediction was requested but no model is attached to the backtest.
    #[error("No model attached to the backtest")]
    ModelNotSet,

    /// The entry request carries non finite prices.
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    /// Pattern features were requested for a trade recorded without a snapshot.
    #[error("Trade #{0} has no metadata snapshot")]
    MissingMetadata(usize),

    /// A sibling array does not line up with the extracted events.
    #[error("Labels mismatch: got {got} labels for {expected} events")]
    LabelLength {
        /// Number of events given to the extractor.
        expected: usize,
        /// Number of labels provided.
        got: usize,
    },

    /// Custom error message.
    #[error("{0}")]
    Msg(String),

    /// I/O error occurred.
    // utils.rs
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error occurred.
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Chart rendering failed.
    #[cfg(feature = "draws")]
    #[error("Plotters error: {0}")]
    Plotters(String),
}
