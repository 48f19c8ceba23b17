//! Magnet field control seam.
//!
//! The magnet hardware is not integrated; the sweep pipeline depends
//! only on this capability trait, and the stub implementation logs each
//! setpoint and waits a settle time the way the bench procedure does.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use tokio::time::sleep;

/// Capability to drive the magnet to a field setpoint.
#[async_trait]
pub trait FieldController: Send + Sync {
    /// Drive the field to `field_t` tesla and return once settled.
    async fn set_field(&mut self, field_t: f64) -> Result<()>;
}

/// Stand-in controller used until the magnet hardware is wired in.
pub struct StubFieldController {
    settle: Duration,
}

impl StubFieldController {
    /// A stub that waits `settle` after each setpoint.
    pub fn new(settle: Duration) -> Self {
        Self { settle }
    }
}

impl Default for StubFieldController {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl FieldController for StubFieldController {
    async fn set_field(&mut self, field_t: f64) -> Result<()> {
        info!("setting field to {field_t:.3} T");
        sleep(self.settle).await;
        Ok(())
    }
}
