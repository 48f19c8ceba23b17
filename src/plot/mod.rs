//! Static plot artifacts rendered with `plotters`.
//!
//! Each function writes one PNG. An empty input series skips the figure
//! with a warning instead of failing the run; the plots are terminal
//! artifacts nothing else consumes.

use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use plotters::prelude::*;

use crate::core::{FieldSweep, MarkerKind, MarkerLog};
use crate::data::fft::FrequencyBin;
use crate::data::magnitude_db;

const FIGURE_SIZE: (u32, u32) = (1000, 500);

/// Min/max over `values`, padded when degenerate, `None` when empty.
fn value_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in values {
        min = min.min(value);
        max = max.max(value);
    }
    if !min.is_finite() || !max.is_finite() {
        return None;
    }
    if min == max {
        min -= 1.0;
        max += 1.0;
    }
    Some((min, max))
}

/// Render a time series with one vertical reference line per marker.
///
/// Each marker kind gets a single legend entry no matter how many
/// markers share it.
pub fn plot_time_series(
    path: &Path,
    title: &str,
    y_label: &str,
    series: &[(f64, f64)],
    markers: &MarkerLog,
) -> Result<()> {
    let Some((y_min, y_max)) = value_range(series.iter().map(|p| p.1)) else {
        warn!("no data for '{title}'; skipping {}", path.display());
        return Ok(());
    };
    let x_max = series
        .iter()
        .map(|p| p.0)
        .chain(markers.iter().map(|m| m.elapsed_s))
        .fold(f64::EPSILON, f64::max);

    let root = BitMapBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc(y_label)
        .draw()?;

    chart
        .draw_series(LineSeries::new(series.iter().copied(), &BLUE))?
        .label(y_label)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    for (kind, color) in [
        (MarkerKind::Mark, RED.mix(0.6)),
        (MarkerKind::Set, MAGENTA.mix(0.6)),
    ] {
        let times: Vec<f64> = markers.of_kind(kind).map(|m| m.elapsed_s).collect();
        if times.is_empty() {
            continue;
        }
        chart
            .draw_series(
                times
                    .iter()
                    .map(|&t| PathElement::new(vec![(t, y_min), (t, y_max)], color)),
            )?
            .label(kind.label())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Render the one-sided magnitude spectrum.
pub fn plot_spectrum(path: &Path, bins: &[FrequencyBin]) -> Result<()> {
    let Some((y_min, y_max)) = value_range(bins.iter().map(|b| b.magnitude)) else {
        warn!("empty spectrum; skipping {}", path.display());
        return Ok(());
    };
    let x_max = bins
        .iter()
        .map(|b| b.frequency)
        .fold(f64::EPSILON, f64::max);

    let root = BitMapBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("FFT of R", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc("Frequency (Hz)")
        .y_desc("Magnitude")
        .draw()?;
    chart.draw_series(LineSeries::new(
        bins.iter().map(|b| (b.frequency, b.magnitude)),
        &MAGENTA,
    ))?;
    root.present()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Render one decibel-magnitude curve per field on a shared frequency axis.
pub fn plot_sweep(path: &Path, sweep: &FieldSweep, s_parameter: &str) -> Result<()> {
    if sweep.traces.is_empty() || sweep.frequencies.len() < 2 {
        warn!("no sweep data; skipping {}", path.display());
        return Ok(());
    }
    let db_traces: Vec<Vec<f64>> = sweep
        .traces
        .iter()
        .map(|t| t.sdata.iter().map(|&z| magnitude_db(z)).collect())
        .collect();
    let Some((y_min, y_max)) = value_range(db_traces.iter().flatten().copied()) else {
        warn!("no sweep data; skipping {}", path.display());
        return Ok(());
    };
    let x_min = sweep.frequencies[0] / 1e9;
    let x_max = sweep.frequencies[sweep.frequencies.len() - 1] / 1e9;

    let root = BitMapBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(format!("{s_parameter} Field Sweeps"), ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc("Frequency (GHz)")
        .y_desc(format!("|{s_parameter}| (dB)"))
        .draw()?;

    for (idx, trace) in sweep.traces.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        chart
            .draw_series(LineSeries::new(
                sweep
                    .frequencies
                    .iter()
                    .zip(&db_traces[idx])
                    .map(|(&f, &db)| (f / 1e9, db)),
                &color,
            ))?
            .label(format!("{:.2} T", trace.field_t))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
