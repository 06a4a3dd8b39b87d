use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use log::{info, warn, LevelFilter};
use progress_bar::{
    finalize_progress_bar, inc_progress_bar, init_progress_bar, set_progress_bar_action, Color,
    Style,
};

use sirs_sweep::plot::{self, TimeSeriesStyle};
use sirs_sweep::{
    baseline, find_infection_peak, logging, run_sweep, write_sweep_csv, RunConfig,
};

/// Simulate a SIRS epidemic, sweep the initial number of infected and plot
/// the results.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON run configuration; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for figures and CSV files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Total population N
    #[arg(long)]
    population: Option<f64>,

    /// Contact rate β
    #[arg(long)]
    beta: Option<f64>,

    /// Recovery rate γ
    #[arg(long)]
    gamma: Option<f64>,

    /// Immunity-waning rate ζ of the sweep runs
    #[arg(long)]
    zeta: Option<f64>,

    /// Immunity-waning rate ζ of the baseline run (0 for plain SIR)
    #[arg(long)]
    baseline_zeta: Option<f64>,

    /// Number of initial-infected values in the sweep
    #[arg(long)]
    sweep_count: Option<usize>,

    /// Last report time
    #[arg(long)]
    t_end: Option<f64>,

    /// Number of report times
    #[arg(long)]
    points: Option<usize>,

    /// Also write baseline.csv and sweep.csv
    #[arg(long)]
    csv: bool,

    /// Console log level
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

impl Args {
    /// Defaults, then the config file, then individual flags.
    fn run_config(&self) -> anyhow::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(population) = self.population {
            config.population = population;
        }
        if let Some(beta) = self.beta {
            config.beta = beta;
        }
        if let Some(gamma) = self.gamma {
            config.gamma = gamma;
        }
        if let Some(zeta) = self.zeta {
            config.zeta = zeta;
        }
        if let Some(zeta) = self.baseline_zeta {
            config.baseline_zeta = zeta;
        }
        if let Some(count) = self.sweep_count {
            config.sweep.count = count;
        }
        if let Some(t_end) = self.t_end {
            config.t_end = t_end;
        }
        if let Some(points) = self.points {
            config.points = points;
        }
        Ok(config)
    }
}

fn create_csv(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.log_level).context("failed to set up logging")?;

    let config = args.run_config()?;
    config.validate().context("invalid run configuration")?;
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.output_dir.display()
        )
    })?;
    let grid = config.grid()?;

    let baseline_params = config.baseline_params();
    info!(
        "R0 = {:.3}, reporting {} points on [{}, {}]",
        baseline_params.basic_reproduction_number(),
        grid.len(),
        grid.start(),
        grid.end()
    );
    let trajectory = baseline(
        &baseline_params,
        config.baseline_i0,
        config.baseline_r0,
        &grid,
    )
    .context("baseline run failed")?;

    // The model is autonomous: integrate over the grid's duration and shift.
    let initial = config.baseline_initial_state();
    match find_infection_peak(&baseline_params, initial, grid.end() - grid.start())
        .context("infection peak search failed")?
    {
        Some(peak) => info!(
            "infection peak at t = {:.3}: I = {:.6}",
            grid.start() + peak.t,
            peak.y[1]
        ),
        None => info!("no infection peak before t = {}", grid.end()),
    }
    if let Some(last) = trajectory.last() {
        info!(
            "baseline at t = {}: S = {:.6}, I = {:.6}, R = {:.6}",
            grid.end(),
            last.s,
            last.i,
            last.r
        );
    }
    let drift = trajectory.max_total_deviation(baseline_params.population);
    if drift > 1e-6 * baseline_params.population {
        warn!("S + I + R drifted from N by {drift:e}");
    }

    plot::time_series(
        &config.time_series_path(),
        &trajectory,
        &TimeSeriesStyle::default(),
    )
    .context("failed to plot the time series")?;

    let sweep_params = config.sweep_params();
    if let Some(eq) = sweep_params.endemic_equilibrium() {
        info!(
            "endemic equilibrium: S* = {:.6}, I* = {:.6}, R* = {:.6}",
            eq.s, eq.i, eq.r
        );
    }

    init_progress_bar(config.sweep.count);
    set_progress_bar_action("Sweep", Color::Blue, Style::Bold);
    let runs = run_sweep(&sweep_params, &config.sweep, &grid, |_, _| inc_progress_bar());
    finalize_progress_bar();
    let runs = runs.context("sweep failed")?;

    plot::phase_portrait(&config.phase_portrait_path(), &runs)
        .context("failed to plot the phase portrait")?;

    if args.csv {
        let path = config.output_dir.join("baseline.csv");
        trajectory
            .write_csv(create_csv(&path)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("wrote baseline trajectory to {}", path.display());

        let path = config.output_dir.join("sweep.csv");
        write_sweep_csv(create_csv(&path)?, &runs)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("wrote {} sweep runs to {}", runs.len(), path.display());
    }

    Ok(())
}
