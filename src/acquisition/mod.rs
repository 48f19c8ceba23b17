//! Lock-in logging pipeline.
//!
//! One task polls the instrument at a fixed cadence while a second
//! watches the console for markers; the two share only a clock handle
//! and a [`state::RunState`]. Once the sampling loop ends, the connection
//! is released on every exit path, then post-processing appends the
//! marker rows, exports the spectrum, and renders the plots.

pub mod annotation;
pub mod session;
pub mod state;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use log::{info, warn};
use tokio::io::AsyncBufRead;

use crate::config::Settings;
use crate::core::{MarkerLog, Sample, ScpiBus, SessionClock};
use crate::data::fft;
use crate::data::storage::{self, LockinLogWriter};
use crate::instrument::Sr865;
use crate::plot;
use self::state::RunState;

/// Everything a completed lock-in run leaves behind.
pub struct LockinArtifacts {
    /// Samples in acquisition order.
    pub samples: Vec<Sample>,
    /// Markers in arrival order.
    pub markers: MarkerLog,
    /// The session log (samples plus marker rows).
    pub log_path: PathBuf,
    /// The one-sided spectrum table of the R series.
    pub spectrum_path: PathBuf,
    /// R-vs-time plot.
    pub r_plot_path: PathBuf,
    /// Theta-vs-time plot.
    pub theta_plot_path: PathBuf,
    /// Spectrum plot.
    pub spectrum_plot_path: PathBuf,
}

/// Run the full lock-in pipeline: sample until the duration ceiling or a
/// console stop, then post-process.
///
/// `input` feeds the annotation listener; production passes buffered
/// stdin, tests pass an in-memory reader. The bus is closed on every
/// exit path, and a close failure never masks the session outcome.
pub async fn run_lockin<B, R>(settings: &Settings, bus: B, input: R) -> Result<LockinArtifacts>
where
    B: ScpiBus,
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let output_dir = &settings.storage.output_dir;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory '{}'", output_dir.display()))?;

    let stem = format!("lockin_{}", Local::now().format("%Y%m%d_%H%M%S"));
    let log_path = output_dir.join(format!("{stem}.csv"));
    let spectrum_path = output_dir.join(format!("{stem}_fft.csv"));
    let r_plot_path = output_dir.join(format!("{stem}_r.png"));
    let theta_plot_path = output_dir.join(format!("{stem}_theta.png"));
    let spectrum_plot_path = output_dir.join(format!("{stem}_fft.png"));

    let mut log = LockinLogWriter::create(&log_path)?;

    let clock = SessionClock::start_now();
    let run_state = Arc::new(RunState::new());
    let listener = tokio::spawn(annotation::listen(input, clock, Arc::clone(&run_state)));

    let mut lockin = Sr865::new(bus);
    let outcome = session::run(&lockin, &clock, &run_state, &settings.lockin, &mut log).await;

    // Teardown happens before the outcome is inspected so the connection
    // is released on every exit path.
    run_state.request_stop();
    if let Err(error) = lockin.close().await {
        warn!("lock-in close failed: {error:#}");
    }
    // A console read in flight cannot be cancelled portably; drop the task.
    listener.abort();

    let samples = outcome?;
    let markers = run_state.markers();
    info!(
        "session ended with {} samples and {} markers",
        samples.len(),
        markers.len()
    );

    log.append_markers(&markers)?;

    let r_series: Vec<(f64, f64)> = samples.iter().map(|s| (s.elapsed_s, s.r_uv)).collect();
    let theta_series: Vec<(f64, f64)> = samples.iter().map(|s| (s.elapsed_s, s.theta_deg)).collect();
    plot::plot_time_series(&r_plot_path, "R over Time", "R (uV)", &r_series, &markers)?;
    plot::plot_time_series(
        &theta_plot_path,
        "Theta over Time",
        "Theta (deg)",
        &theta_series,
        &markers,
    )?;

    let r_values: Vec<f64> = samples.iter().map(|s| s.r_uv).collect();
    let spectrum = fft::one_sided_spectrum(&r_values, settings.lockin.sampling_interval_s);
    storage::write_spectrum(&spectrum_path, &spectrum)?;
    plot::plot_spectrum(&spectrum_plot_path, &spectrum)?;

    info!("lock-in log written to {}", log_path.display());
    Ok(LockinArtifacts {
        samples,
        markers,
        log_path,
        spectrum_path,
        r_plot_path,
        theta_plot_path,
        spectrum_plot_path,
    })
}
