//! Module for visualizing backtest reports and candle charts.

use std::path::PathBuf;

use crate::engine::{Backtest, BarSeries, Report};
use crate::errors::{Error, Result};

use plotters::backend::{BitMapBackend, DrawingBackend, SVGBackend};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::WHITE;

/// Aspect ratio for the generated charts.
const ASPECT_RATIO: f64 = 0.5625;
/// Size of the X-axis labels.
const X_LABEL_SIZE: i32 = 20;
/// Size of the Y-axis labels.
const Y_LABEL_SIZE: i32 = 20;

/// Output formats for the generated charts with output filename.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOutput {
    /// Save to the output SVG file.
    Svg(PathBuf),
    /// Save to the output PNG file.
    Png(PathBuf),
}

impl Default for DrawOutput {
    fn default() -> Self {
        Self::Svg(PathBuf::from("bts-ml.svg"))
    }
}

/// Configuration options for chart generation.
#[derive(Debug, Clone, Default)]
pub struct DrawOptions {
    /// Chart title.
    title: Option<String>,
    /// Output format and path.
    output: DrawOutput,
    /// Whether to show the trades and the equity curve.
    show_equity: bool,
    /// Whether to show the summary panel.
    show_summary: bool,
}

impl DrawOptions {
    /// Sets the chart title.
    pub fn title(mut self, title: impl ToString) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Sets the output format and path.
    pub fn draw_output(mut self, output: DrawOutput) -> Self {
        self.output = output;
        self
    }

    /// Enables or disables the trade markers and the equity curve.
    pub fn show_equity(mut self, show: bool) -> Self {
        self.show_equity = show;
        self
    }

    /// Enables or disables the summary panel.
    pub fn show_summary(mut self, show: bool) -> Self {
        self.show_summary = show;
        self
    }
}

/// Chart drawing utility for backtest visualization.
#[derive(Default)]
pub struct Draw<'d> {
    /// Bars to draw.
    series: Option<&'d BarSeries>,
    /// Optional run to overlay.
    report: Option<&'d Report>,
    /// Drawing options.
    options: DrawOptions,
}

impl<'d> Draw<'d> {
    /// Creates a new `Draw` instance with the bars of a backtest.
    pub fn with_backtest(backtest: &'d Backtest) -> Self {
        Self::with_series(backtest.series())
    }

    /// Creates a new `Draw` instance with a bar series.
    pub fn with_series(series: &'d BarSeries) -> Self {
        Self {
            series: Some(series),
            report: None,
            options: DrawOptions::default(),
        }
    }

    /// Overlays the trades, equity and summary of a run.
    pub fn with_report(mut self, report: &'d Report) -> Self {
        self.report = Some(report);
        self
    }

    /// Sets the drawing options.
    pub fn with_options(mut self, options: DrawOptions) -> Self {
        self.options = options;
        self
    }

    /// Generates and saves the chart based on the configured options.
    pub fn plot(&self) -> Result<()> {
        let series = self.series.ok_or(Error::Msg("No bar series provided".to_string()))?;
        if (self.options.show_equity || self.options.show_summary) && self.report.is_none() {
            return Err(Error::Msg("No report provided".to_string()));
        }

        let title = self.options.title.as_deref().unwrap_or("BTS-ML Chart");
        let height_factor = if self.options.show_summary { 1.2 } else { 1.0 };

        let bar_count = series.len() as u32;
        let width = 1280.max(10 * bar_count);
        let height = ((width as f64 * ASPECT_RATIO * height_factor) as u32).min(900);

        match &self.options.output {
            DrawOutput::Svg(path) => {
                let root = SVGBackend::new(path, (width, height)).into_drawing_area();
                root.fill(&WHITE).map_err(|e| Error::Plotters(e.to_string()))?;
                self.draw_chart(&root, series, title)
            }
            DrawOutput::Png(path) => {
                let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
                root.fill(&WHITE).map_err(|e| Error::Plotters(e.to_string()))?;
                self.draw_chart(&root, series, title)
            }
        }
    }

    /// Draws the main chart with prices and the summary panel.
    fn draw_chart<DB: DrawingBackend>(
        &self,
        drawing_area: &DrawingArea<DB, Shift>,
        series: &BarSeries,
        title: &str,
    ) -> Result<()> {
        let total_height = drawing_area.dim_in_pixel().1 as f64;
        let summary_height = if self.options.show_summary {
            total_height * 0.15
        } else {
            0.0
        };

        let (summary_area, price_area) = if self.options.show_summary {
            drawing_area.split_vertically(summary_height as u32)
        } else {
            (drawing_area.clone(), drawing_area.clone())
        };

        self.draw_price_chart(&price_area, series, title)?;
        if self.options.show_summary
            && let Some(report) = self.report
        {
            self.draw_summary(&summary_area, report)?;
        }

        drawing_area.present().map_err(|e| Error::Plotters(e.to_string()))
    }

    /// Draws the price chart (candlesticks), the trades and the equity curve.
    fn draw_price_chart<DB: DrawingBackend>(
        &self,
        drawing_area: &DrawingArea<DB, Shift>,
        series: &BarSeries,
        title: &str,
    ) -> Result<()> {
        let min_price = series.lows().iter().copied().fold(f64::INFINITY, f64::min);
        let max_price = series.highs().iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (first_time, last_time) = (series.start_time(), series.end_time().max(series.start_time() + 1));
        let price_padding = ((max_price - min_price) * 0.1).max(f64::EPSILON);

        let equity = match self.report {
            Some(report) if self.options.show_equity => {
                let initial_cash = report.summary().initial_cash;
                std::iter::once((first_time, initial_cash))
                    .chain(report.equity().iter().copied())
                    .chain(std::iter::once((last_time, report.summary().final_cash)))
                    .collect::<Vec<_>>()
            }
            _ => Vec::new(),
        };
        let min_cash = equity.iter().map(|(_, c)| *c).fold(f64::INFINITY, f64::min);
        let max_cash = equity.iter().map(|(_, c)| *c).fold(f64::NEG_INFINITY, f64::max);
        let (min_cash, max_cash) = if equity.is_empty() {
            (0.0, 1.0)
        } else {
            (min_cash - 1.0, max_cash + 1.0)
        };

        let drawing_area = drawing_area.margin(10, 10, 70, 70);
        let mut chart = ChartBuilder::on(&drawing_area)
            .caption(title, ("sans-serif", 30).into_font())
            .x_label_area_size(X_LABEL_SIZE)
            .y_label_area_size(Y_LABEL_SIZE)
            .right_y_label_area_size(Y_LABEL_SIZE)
            .build_cartesian_2d(
                first_time..last_time,
                min_price - price_padding..max_price + price_padding,
            )
            .map_err(|e| Error::Plotters(e.to_string()))?
            .set_secondary_coord(first_time..last_time, min_cash..max_cash);

        chart
            .configure_mesh()
            .y_desc("Price")
            .x_desc("Time")
            .x_label_style(("sans-serif", X_LABEL_SIZE))
            .y_label_style(("sans-serif", Y_LABEL_SIZE))
            .x_labels((series.len() / 15).max(2))
            .y_labels(5)
            .draw()
            .map_err(|e| Error::Plotters(e.to_string()))?;

        let candle_width = {
            let total_width = drawing_area.dim_in_pixel().0 as f64;
            let available_width = total_width - (X_LABEL_SIZE * 2) as f64;
            (available_width / series.len() as f64).max(5.0) as u32
        };

        chart
            .draw_series(series.bars().map(|bar| {
                let color = if bar.close() >= bar.open() { GREEN.filled() } else { RED.filled() };
                CandleStick::new(
                    bar.timestamp(),
                    bar.open(),
                    bar.high(),
                    bar.low(),
                    bar.close(),
                    color,
                    color,
                    candle_width,
                )
            }))
            .map_err(|e| Error::Plotters(e.to_string()))?;

        let Some(report) = self.report.filter(|_| self.options.show_equity) else {
            return Ok(());
        };

        chart
            .configure_secondary_axes()
            .y_desc("Cash")
            .label_style(("sans-serif", Y_LABEL_SIZE))
            .y_labels(5)
            .draw()
            .map_err(|e| Error::Plotters(e.to_string()))?;

        let entries = report
            .trades()
            .iter()
            .map(|t| Circle::new((t.entry_time(), t.entry_price()), 4, BLUE.filled()));
        let exits = report.trades().iter().map(|t| {
            let color = if t.pnl() > 0.0 { GREEN } else { RED };
            Circle::new((t.exit_time(), t.exit_price()), 4, color.stroke_width(2))
        });

        chart.draw_series(entries).map_err(|e| Error::Plotters(e.to_string()))?;
        chart.draw_series(exits).map_err(|e| Error::Plotters(e.to_string()))?;
        chart
            .draw_secondary_series(LineSeries::new(equity, BLUE))
            .map_err(|e| Error::Plotters(e.to_string()))?;

        Ok(())
    }

    /// Draws the summary panel.
    fn draw_summary<DB: DrawingBackend>(&self, drawing_area: &DrawingArea<DB, Shift>, report: &Report) -> Result<()> {
        let table = report.summary().table();
        let value = |key: &str| {
            table
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
                .unwrap_or("undefined")
        };
        let text = format!(
            "Trades: {} | Win Rate: {} | Net Profit: {} | Max Drawdown: {} | Profit Factor: {}",
            value("# of trades"),
            value("win rate"),
            value("net profit"),
            value("max drawdown"),
            value("profit factor"),
        );

        let drawing_area = drawing_area.margin(30, 0, 70, 70);
        drawing_area
            .draw(&Text::new(text, (0, 0), ("sans-serif", 28).into_font()))
            .map_err(|e| Error::Plotters(e.to_string()))
    }
}
