//! VISA bus implementation.
//!
//! Provides a [`ScpiBus`] implementation for instruments reachable through
//! the VISA (Virtual Instrument Software Architecture) standard, using the
//! `visa-rs` crate. Supports resource strings like:
//!
//! - `USB0::0xB506::0x2000::004198::INSTR` (USB)
//! - `TCPIP0::192.168.0.5::inst0::INSTR` (Ethernet/LXI)
//! - `GPIB0::16::INSTR` (GPIB)
//!
//! Blocking VISA calls run on Tokio's blocking thread pool so acquisition
//! tasks are never stalled by bus round-trips. The module is feature-gated:
//! without `instrument_visa` a stub is compiled whose constructor returns an
//! error explaining how to enable the real implementation.

#[cfg(feature = "instrument_visa")]
mod enabled {
    use std::ffi::CString;
    use std::io::{Read, Write};
    use std::sync::Arc;

    use anyhow::{anyhow, Context, Result};
    use async_trait::async_trait;
    use log::debug;
    use tokio::sync::Mutex;
    use visa_rs::prelude::*;

    use crate::core::ScpiBus;

    /// A [`ScpiBus`] over an open VISA session.
    pub struct VisaBus {
        resource_string: String,
        line_terminator: String,
        session: Option<Arc<Mutex<Instrument>>>,
    }

    impl VisaBus {
        /// Open the VISA resource named by `resource_string`.
        pub async fn open(resource_string: &str) -> Result<Self> {
            let resource = resource_string.to_string();
            let session = tokio::task::spawn_blocking(move || {
                let rm = DefaultRM::new().context("failed to create VISA resource manager")?;
                let c_string =
                    CString::new(resource.clone()).context("resource string contains NUL")?;
                let visa_string = visa_rs::VisaString::from(c_string);
                let session = rm
                    .open(&visa_string, AccessMode::NO_LOCK, TIMEOUT_IMMEDIATE)
                    .with_context(|| format!("failed to open VISA resource '{resource}'"))?;
                Ok::<_, anyhow::Error>(session)
            })
            .await
            .context("VISA open task panicked")??;

            debug!("VISA resource '{resource_string}' opened");
            Ok(Self {
                resource_string: resource_string.to_string(),
                line_terminator: "\n".to_string(),
                session: Some(Arc::new(Mutex::new(session))),
            })
        }

        fn session(&self) -> Result<Arc<Mutex<Instrument>>> {
            self.session
                .clone()
                .ok_or_else(|| anyhow!("VISA resource '{}' is closed", self.resource_string))
        }
    }

    #[async_trait]
    impl ScpiBus for VisaBus {
        async fn query(&self, command: &str) -> Result<String> {
            let session = self.session()?;
            let message = format!("{}{}", command, self.line_terminator);
            let command_for_log = command.to_string();

            let response = tokio::task::spawn_blocking(move || {
                let mut guard = session.blocking_lock();
                guard
                    .write_all(message.as_bytes())
                    .with_context(|| format!("VISA write failed for: {command_for_log}"))?;
                let mut buf = [0u8; 4096];
                let bytes_read = guard
                    .read(&mut buf)
                    .with_context(|| format!("VISA read failed for: {command_for_log}"))?;
                Ok::<_, anyhow::Error>(
                    String::from_utf8_lossy(&buf[..bytes_read]).trim().to_string(),
                )
            })
            .await
            .context("VISA I/O task panicked")??;

            debug!("VISA query '{command}' -> '{response}'");
            Ok(response)
        }

        async fn write(&self, command: &str) -> Result<()> {
            let session = self.session()?;
            let message = format!("{}{}", command, self.line_terminator);
            let command_for_log = command.to_string();

            tokio::task::spawn_blocking(move || {
                let mut guard = session.blocking_lock();
                guard
                    .write_all(message.as_bytes())
                    .with_context(|| format!("VISA write failed for: {command_for_log}"))?;
                Ok::<_, anyhow::Error>(())
            })
            .await
            .context("VISA I/O task panicked")??;

            debug!("VISA command sent: {command}");
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            if self.session.take().is_some() {
                debug!("VISA resource '{}' closed", self.resource_string);
            }
            Ok(())
        }
    }
}

#[cfg(not(feature = "instrument_visa"))]
mod disabled {
    use anyhow::Result;
    use async_trait::async_trait;

    use crate::core::ScpiBus;
    use crate::error::DaqError;

    /// Stub compiled when the `instrument_visa` feature is disabled.
    pub struct VisaBus;

    impl VisaBus {
        /// Always fails; rebuild with `--features instrument_visa`.
        pub async fn open(_resource_string: &str) -> Result<Self> {
            Err(DaqError::VisaFeatureDisabled.into())
        }
    }

    #[async_trait]
    impl ScpiBus for VisaBus {
        async fn query(&self, _command: &str) -> Result<String> {
            Err(DaqError::VisaFeatureDisabled.into())
        }

        async fn write(&self, _command: &str) -> Result<()> {
            Err(DaqError::VisaFeatureDisabled.into())
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(feature = "instrument_visa")]
pub use enabled::VisaBus;

#[cfg(not(feature = "instrument_visa"))]
pub use disabled::VisaBus;
