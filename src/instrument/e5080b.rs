//! Keysight E5080B ENA-series VNA driver.
//!
//! Setup commands mirror the front-panel flow: preset, frequency range,
//! point count, source power, IF bandwidth, measurement selection, single
//! sweep mode. Trace data is transferred in ASCII as interleaved re/im
//! pairs. Sweep completion is awaited through `*OPC?`, bounded by a caller
//! supplied timeout since the instrument gives no progress indication.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::warn;
use num_complex::Complex64;
use tokio::time::{sleep, timeout};

use crate::core::ScpiBus;
use crate::error::DaqError;

/// Settle time after a factory preset.
const PRESET_SETTLE: Duration = Duration::from_secs(5);
/// Settle time after loading a stored correction file.
const CALIBRATION_SETTLE: Duration = Duration::from_secs(2);

/// Driver for the Keysight E5080B VNA over any [`ScpiBus`].
pub struct E5080b<B: ScpiBus> {
    bus: B,
}

impl<B: ScpiBus> E5080b<B> {
    /// Wrap an open bus connection.
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Identification string reported by the instrument.
    pub async fn identify(&self) -> Result<String> {
        self.bus.query("*IDN?").await
    }

    /// Preset to factory defaults and wait for the instrument to settle.
    pub async fn preset(&self) -> Result<()> {
        self.bus.write(":SYST:PRES").await?;
        sleep(PRESET_SETTLE).await;
        Ok(())
    }

    /// Ensure ASCII transfer format so trace fetches are parseable.
    pub async fn set_ascii_format(&self) -> Result<()> {
        self.bus.write(":FORM:DATA ASCII").await
    }

    /// Set the sweep frequency range in Hz.
    pub async fn set_frequency_range(&self, start_hz: f64, stop_hz: f64) -> Result<()> {
        self.bus
            .write(&format!(":SENS1:FREQ:STAR {start_hz}"))
            .await?;
        self.bus.write(&format!(":SENS1:FREQ:STOP {stop_hz}")).await
    }

    /// Set the number of frequency points per sweep.
    pub async fn set_points(&self, points: usize) -> Result<()> {
        self.bus.write(&format!(":SENS1:SWE:POIN {points}")).await
    }

    /// Set the source power in dBm.
    pub async fn set_power(&self, power_dbm: f64) -> Result<()> {
        self.bus.write(&format!(":SOUR1:POW {power_dbm}")).await
    }

    /// Set the IF bandwidth in Hz.
    pub async fn set_if_bandwidth(&self, bandwidth_hz: f64) -> Result<()> {
        self.bus.write(&format!(":SENS1:BWID {bandwidth_hz}")).await
    }

    /// Select or create an S-parameter measurement (e.g. S21, S11).
    pub async fn select_measurement(&self, s_parameter: &str) -> Result<()> {
        self.bus
            .write(&format!(":CALC1:PAR:DEF 'Meas1',{s_parameter}"))
            .await?;
        self.bus.write(":DISP:WIND1:TRAC1:FEED 'Meas1'").await?;
        self.bus.write(":CALC1:PAR:SEL 'Meas1'").await
    }

    /// Load a stored correction/calibration file and wait for it to apply.
    pub async fn load_calibration(&self, filepath: &str) -> Result<()> {
        self.bus
            .write(&format!(":MMEM:LOAD:CORR \"{filepath}\""))
            .await
            .with_context(|| format!("failed to load calibration file '{filepath}'"))?;
        sleep(CALIBRATION_SETTLE).await;
        Ok(())
    }

    /// Put the analyzer in single-sweep mode.
    pub async fn set_single_sweep(&self) -> Result<()> {
        self.bus.write(":INIT1:CONT OFF").await
    }

    /// Trigger one sweep and block until the instrument reports completion.
    ///
    /// The `*OPC?` wait is bounded by `opc_timeout`; expiry fails with
    /// [`DaqError::SweepTimeout`] rather than stalling the session.
    pub async fn trigger_sweep(&self, opc_timeout: Duration) -> Result<()> {
        self.bus.write(":INIT1:IMM").await?;
        timeout(opc_timeout, self.bus.query("*OPC?"))
            .await
            .map_err(|_| DaqError::SweepTimeout(opc_timeout))??;
        Ok(())
    }

    /// Fetch the selected measurement's complex trace.
    pub async fn fetch_sdata(&self) -> Result<Vec<Complex64>> {
        let raw = self.bus.query(":CALC1:DATA? SDATA").await?;
        parse_sdata(&raw)
    }

    /// Drain the head of the system error queue, logging anything non-zero.
    pub async fn check_errors(&self) -> Result<()> {
        let err = self.bus.query(":SYST:ERR?").await?;
        if !err.trim().starts_with('0') {
            warn!("instrument error queue: {}", err.trim());
        }
        Ok(())
    }

    /// Release the underlying bus connection.
    pub async fn close(&mut self) -> Result<()> {
        self.bus.close().await
    }
}

/// Parse an ASCII `SDATA` response of interleaved re/im pairs.
fn parse_sdata(raw: &str) -> Result<Vec<Complex64>> {
    let values = raw
        .trim()
        .split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<f64>()
                .with_context(|| format!("unparseable trace value '{token}'"))
        })
        .collect::<Result<Vec<f64>>>()?;

    if values.len() < 2 {
        return Err(anyhow!(
            "incomplete trace data: got {} values",
            values.len()
        ));
    }
    if values.len() % 2 != 0 {
        return Err(anyhow!(
            "odd trace data length {}; expected interleaved re/im pairs",
            values.len()
        ));
    }

    Ok(values
        .chunks_exact(2)
        .map(|pair| Complex64::new(pair[0], pair[1]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::MockBus;

    #[tokio::test]
    async fn test_fetch_sdata_parses_interleaved_pairs() {
        let bus =
            MockBus::new().with_response(":CALC1:DATA? SDATA", "1.0,0.0,0.5,-0.5,0.0,1.0");
        let vna = E5080b::new(bus);

        let trace = vna.fetch_sdata().await.unwrap();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[1], Complex64::new(0.5, -0.5));
    }

    #[tokio::test]
    async fn test_fetch_sdata_rejects_odd_length() {
        let bus = MockBus::new().with_response(":CALC1:DATA? SDATA", "1.0,0.0,0.5");
        let vna = E5080b::new(bus);

        let err = vna.fetch_sdata().await.unwrap_err();
        assert!(err.to_string().contains("odd trace data length"));
    }

    #[tokio::test]
    async fn test_fetch_sdata_rejects_short_response() {
        let bus = MockBus::new().with_response(":CALC1:DATA? SDATA", "1.0");
        let vna = E5080b::new(bus);
        assert!(vna.fetch_sdata().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_sweep_times_out() {
        let bus = MockBus::new();
        bus.push_delayed_reply("*OPC?", Duration::from_secs(3600), "1");
        let vna = E5080b::new(bus);

        let err = vna.trigger_sweep(Duration::from_secs(60)).await.unwrap_err();
        let daq_err = err.downcast_ref::<DaqError>();
        assert!(
            matches!(daq_err, Some(DaqError::SweepTimeout(_))),
            "expected SweepTimeout, got {err:#}"
        );
    }

    #[tokio::test]
    async fn test_trigger_sweep_waits_for_opc() {
        let bus = MockBus::new().with_response("*OPC?", "1");
        let vna = E5080b::new(bus.clone());

        vna.trigger_sweep(Duration::from_secs(60)).await.unwrap();
        assert_eq!(bus.writes(), vec![":INIT1:IMM".to_string()]);
        assert_eq!(bus.queries(), vec!["*OPC?".to_string()]);
    }
}
