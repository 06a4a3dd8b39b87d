//! Figures: time series of one run and the S-I phase portrait of a sweep
//!
//! Both figures are rendered with `plotters` to SVG files.

use std::ops::Range;
use std::path::Path;

use log::info;
use plotters::prelude::*;
use thiserror::Error;

use crate::driver::SweepRun;
use crate::trajectory::Trajectory;

const FIGURE_SIZE: (u32, u32) = (960, 720);
const PLOT_BACKGROUND: RGBColor = RGBColor(0xdd, 0xdd, 0xdd);

/// Rendering failures
#[derive(Debug, Error)]
pub enum PlotError {
    /// Nothing to draw
    #[error("nothing to plot: {0}")]
    Empty(&'static str),
    /// The backend failed to draw or write the file
    #[error("failed to render {path}: {message}")]
    Render {
        /// Output file
        path: String,
        /// Backend error
        message: String,
    },
}

/// Labels and ranges of the time-series figure
#[derive(Debug, Clone)]
pub struct TimeSeriesStyle {
    /// Figure caption, none by default
    pub caption: Option<String>,
    /// X axis label
    pub x_label: String,
    /// Y axis label
    pub y_label: String,
    /// Y axis range
    pub y_range: Range<f64>,
}

impl Default for TimeSeriesStyle {
    fn default() -> Self {
        Self {
            caption: None,
            x_label: "Time /days".to_string(),
            y_label: "Fraction of population".to_string(),
            y_range: 0.0..1.2,
        }
    }
}

fn render_error<E: std::fmt::Display>(path: &Path) -> impl Fn(E) -> PlotError + '_ {
    move |e| PlotError::Render {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Draw S, I and R against time.
pub fn time_series(
    path: &Path,
    trajectory: &Trajectory,
    style: &TimeSeriesStyle,
) -> Result<(), PlotError> {
    if trajectory.len() < 2 {
        return Err(PlotError::Empty("time series needs at least two samples"));
    }
    let err = render_error(path);
    let times = trajectory.times();
    let x_range = times[0]..times[times.len() - 1];

    let root = SVGBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(&err)?;

    let mut builder = ChartBuilder::on(&root);
    builder
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60);
    if let Some(caption) = &style.caption {
        builder.caption(caption, ("sans-serif", 24));
    }
    let mut chart = builder
        .build_cartesian_2d(x_range, style.y_range.clone())
        .map_err(&err)?;

    chart.plotting_area().fill(&PLOT_BACKGROUND).map_err(&err)?;
    chart
        .configure_mesh()
        .bold_line_style(WHITE.stroke_width(2))
        .light_line_style(TRANSPARENT)
        .axis_style(TRANSPARENT)
        .x_desc(style.x_label.as_str())
        .y_desc(style.y_label.as_str())
        .draw()
        .map_err(&err)?;

    let series = [
        ("Susceptible", BLUE, trajectory.susceptible()),
        ("Infected", RED, trajectory.infected()),
        ("Recovered with immunity", GREEN, trajectory.recovered()),
    ];
    for (label, color, values) in series {
        let line = color.mix(0.5).stroke_width(2);
        chart
            .draw_series(LineSeries::new(times.iter().copied().zip(values), line))
            .map_err(&err)?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], line));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.5))
        .border_style(BLACK.mix(0.3))
        .draw()
        .map_err(&err)?;
    root.present().map_err(&err)?;

    info!("wrote time series to {}", path.display());
    Ok(())
}

/// Draw I against S for every sweep run.
pub fn phase_portrait(path: &Path, runs: &[SweepRun]) -> Result<(), PlotError> {
    if runs.iter().all(|run| run.trajectory.is_empty()) {
        return Err(PlotError::Empty("phase portrait needs at least one sample"));
    }
    let err = render_error(path);

    let states = || runs.iter().flat_map(|run| run.trajectory.states());
    let x_range = padded_range(states().map(|s| s.s));
    let y_range = padded_range(states().map(|s| s.i));

    let root = SVGBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(&err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(&err)?;

    chart.plotting_area().fill(&PLOT_BACKGROUND).map_err(&err)?;
    chart
        .configure_mesh()
        .bold_line_style(WHITE.stroke_width(2))
        .light_line_style(TRANSPARENT)
        .x_desc("Susceptible")
        .y_desc("Infected")
        .draw()
        .map_err(&err)?;

    for run in runs {
        chart
            .draw_series(LineSeries::new(
                run.trajectory.states().iter().map(|s| (s.s, s.i)),
                GREEN.stroke_width(1),
            ))
            .map_err(&err)?;
    }
    root.present().map_err(&err)?;

    info!(
        "wrote phase portrait of {} runs to {}",
        runs.len(),
        path.display()
    );
    Ok(())
}

/// Data range widened by 5 % on each side; never empty.
fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return 0.0..1.0;
    }
    let pad = if hi > lo { 0.05 * (hi - lo) } else { 0.5 };
    (lo - pad)..(hi + pad)
}
