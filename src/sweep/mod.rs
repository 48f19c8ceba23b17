//! VNA field-sweep pipeline.
//!
//! Fully sequential: configure the analyzer once, then for each field
//! setpoint drive the magnet, trigger a single sweep, wait for the
//! completion acknowledgement, and fetch one complex trace. Any setup or
//! fetch error aborts the remaining sweep list; only the calibration
//! load is advisory. The export verifies every trace length before any
//! output file is written.

pub mod field;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use log::{info, warn};

use crate::config::{Settings, VnaSettings};
use crate::core::{FieldSweep, ScpiBus, SweepTrace};
use crate::data::storage;
use crate::instrument::E5080b;
use crate::plot;
use self::field::FieldController;

/// Everything a completed field-sweep run leaves behind.
#[derive(Debug)]
pub struct SweepArtifacts {
    /// The captured traces and their shared frequency axis.
    pub sweep: FieldSweep,
    /// The exported magnitude table.
    pub table_path: PathBuf,
    /// The per-field magnitude plot.
    pub plot_path: PathBuf,
}

/// Run the full sweep pipeline against an open bus.
///
/// The bus is closed on every exit path; a close failure never masks
/// the run outcome.
pub async fn run_sweep<B, F>(settings: &Settings, bus: B, field: &mut F) -> Result<SweepArtifacts>
where
    B: ScpiBus,
    F: FieldController + ?Sized,
{
    let output_dir = &settings.storage.output_dir;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory '{}'", output_dir.display()))?;

    let mut vna = E5080b::new(bus);
    let outcome = acquire(&vna, &settings.vna, field).await;
    if let Err(error) = vna.close().await {
        warn!("VNA close failed: {error:#}");
    }
    let sweep = outcome?;
    info!("all sweeps complete ({} traces)", sweep.traces.len());

    let stem = format!("sweep_{}", Local::now().format("%Y%m%d_%H%M%S"));
    let table_path = output_dir.join(format!("{stem}.csv"));
    let plot_path = output_dir.join(format!("{stem}.png"));

    storage::write_sweep_table(&table_path, &sweep, &settings.vna)?;
    plot::plot_sweep(&plot_path, &sweep, &settings.vna.s_parameter)?;

    info!("sweep table written to {}", table_path.display());
    Ok(SweepArtifacts {
        sweep,
        table_path,
        plot_path,
    })
}

/// Configure the analyzer and capture one trace per field setpoint.
async fn acquire<B, F>(
    vna: &E5080b<B>,
    settings: &VnaSettings,
    field: &mut F,
) -> Result<FieldSweep>
where
    B: ScpiBus,
    F: FieldController + ?Sized,
{
    let idn = vna.identify().await.context("VNA identification failed")?;
    info!("connected to {}", idn.trim());

    info!("presetting and configuring VNA");
    vna.set_ascii_format().await?;
    vna.preset().await?;
    vna.set_frequency_range(settings.start_hz, settings.stop_hz)
        .await?;
    vna.set_points(settings.points).await?;
    vna.set_power(settings.power_dbm).await?;
    vna.set_if_bandwidth(settings.if_bandwidth_hz).await?;
    vna.select_measurement(&settings.s_parameter).await?;
    vna.set_single_sweep().await?;

    // Calibration is advisory: an uncalibrated sweep is still useful.
    if let Some(calibration) = &settings.calibration_file {
        match vna.load_calibration(calibration).await {
            Ok(()) => info!("calibration '{calibration}' loaded"),
            Err(error) => warn!("calibration load skipped: {error:#}"),
        }
    }
    vna.check_errors().await?;

    let mut sweep = FieldSweep {
        frequencies: settings.frequencies(),
        traces: Vec::new(),
    };
    for field_t in settings.field.setpoints() {
        field
            .set_field(field_t)
            .await
            .with_context(|| format!("failed to set field to {field_t:.3} T"))?;
        vna.trigger_sweep(settings.opc_timeout())
            .await
            .with_context(|| format!("sweep at {field_t:.3} T did not complete"))?;
        let sdata = vna
            .fetch_sdata()
            .await
            .with_context(|| format!("trace fetch failed at {field_t:.3} T"))?;
        info!("sweep complete at {field_t:.3} T ({} points)", sdata.len());
        sweep.traces.push(SweepTrace { field_t, sdata });
    }
    Ok(sweep)
}
