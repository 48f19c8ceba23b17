//! Stanford Research SR865 lock-in amplifier driver.
//!
//! The four output channels are read with `OUTP? 0..3`. X, Y, and R come
//! back in volts and are scaled to microvolts here so the rest of the
//! pipeline works in the units the log file records.

use anyhow::{Context, Result};

use crate::core::ScpiBus;

const VOLTS_TO_MICROVOLTS: f64 = 1e6;

/// One simultaneous read of the four output channels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LockinOutputs {
    /// In-phase component in microvolts.
    pub x_uv: f64,
    /// Quadrature component in microvolts.
    pub y_uv: f64,
    /// Magnitude in microvolts.
    pub r_uv: f64,
    /// Phase in degrees.
    pub theta_deg: f64,
}

/// Driver for the SR865 lock-in amplifier over any [`ScpiBus`].
pub struct Sr865<B: ScpiBus> {
    bus: B,
}

impl<B: ScpiBus> Sr865<B> {
    /// Wrap an open bus connection.
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Identification string reported by the instrument.
    pub async fn identify(&self) -> Result<String> {
        self.bus.query("*IDN?").await
    }

    /// Read X, Y, R (microvolts) and Theta (degrees).
    pub async fn read_outputs(&self) -> Result<LockinOutputs> {
        let x_uv = self.query_f64("OUTP? 0").await? * VOLTS_TO_MICROVOLTS;
        let y_uv = self.query_f64("OUTP? 1").await? * VOLTS_TO_MICROVOLTS;
        let r_uv = self.query_f64("OUTP? 2").await? * VOLTS_TO_MICROVOLTS;
        let theta_deg = self.query_f64("OUTP? 3").await?;
        Ok(LockinOutputs {
            x_uv,
            y_uv,
            r_uv,
            theta_deg,
        })
    }

    async fn query_f64(&self, command: &str) -> Result<f64> {
        let response = self.bus.query(command).await?;
        response
            .trim()
            .parse::<f64>()
            .with_context(|| format!("unparseable response to '{command}': '{response}'"))
    }

    /// Release the underlying bus connection.
    pub async fn close(&mut self) -> Result<()> {
        self.bus.close().await
    }
}
