//! Core data types and the instrument-bus abstraction.
//!
//! This module defines the foundational types shared by both pipelines:
//!
//! - [`Sample`] / [`Marker`] / [`MarkerLog`]: the lock-in session's data model
//! - [`SweepTrace`] / [`FieldSweep`]: the VNA session's data model
//! - [`ScpiBus`]: the capability interface every concrete bus implements
//! - [`SessionClock`]: the shared start-of-session time reference
//!
//! # Thread Safety
//!
//! [`ScpiBus`] requires `Send + Sync` so a connection handle can live inside
//! a Tokio task. The handle is exclusively owned by one session controller;
//! no other component touches it.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use num_complex::Complex64;
use tokio::time::Instant;

// =============================================================================
// Lock-in data model
// =============================================================================

/// A single lock-in reading, stamped with session-relative time.
///
/// X, Y, and R are scaled to microvolts by the driver; Theta stays in
/// degrees. Immutable once recorded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Seconds since the start of the session.
    pub elapsed_s: f64,
    /// In-phase component in microvolts.
    pub x_uv: f64,
    /// Quadrature component in microvolts.
    pub y_uv: f64,
    /// Magnitude in microvolts.
    pub r_uv: f64,
    /// Phase in degrees.
    pub theta_deg: f64,
}

/// The two kinds of operator-entered event markers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    /// A field-switch marker (`m` at the console).
    Mark,
    /// A set-point marker (`n` at the console).
    Set,
}

impl MarkerKind {
    /// Label used in the CSV `Note` column and in plot legends.
    pub fn label(self) -> &'static str {
        match self {
            MarkerKind::Mark => "MARK",
            MarkerKind::Set => "SET",
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A timestamped event tag entered by the operator during acquisition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Marker {
    /// Which token produced this marker.
    pub kind: MarkerKind,
    /// Seconds since the start of the session, on the same clock as samples.
    pub elapsed_s: f64,
}

/// Append-only log of markers in arrival order.
///
/// Consumers that need the export partitioning (all MARK rows, then all SET
/// rows) use [`MarkerLog::of_kind`] rather than re-sorting the log.
#[derive(Clone, Debug, Default)]
pub struct MarkerLog {
    entries: Vec<Marker>,
}

impl MarkerLog {
    /// Append a marker.
    pub fn push(&mut self, marker: Marker) {
        self.entries.push(marker);
    }

    /// All markers in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.entries.iter()
    }

    /// Markers of one kind, in arrival order.
    pub fn of_kind(&self, kind: MarkerKind) -> impl Iterator<Item = &Marker> {
        self.entries.iter().filter(move |m| m.kind == kind)
    }

    /// Number of markers recorded.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no markers were recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Sweep data model
// =============================================================================

/// One complex S-parameter trace captured at a fixed field setpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepTrace {
    /// Magnet field setpoint in tesla.
    pub field_t: f64,
    /// Complex S-parameter values, one per frequency point.
    pub sdata: Vec<Complex64>,
}

/// The accumulated result of a field-sweep session.
///
/// Traces are kept in acquisition (setpoint) order; setpoints are assumed
/// distinct since they come from an evenly spaced plan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldSweep {
    /// Frequency axis shared by every trace, in Hz.
    pub frequencies: Vec<f64>,
    /// Captured traces.
    pub traces: Vec<SweepTrace>,
}

// =============================================================================
// Instrument bus
// =============================================================================

/// Capability interface for a message-based instrument connection.
///
/// The acquisition and sweep controllers depend only on this interface and
/// never embed command syntax; command strings belong to the concrete
/// drivers ([`crate::instrument::Sr865`], [`crate::instrument::E5080b`]).
#[async_trait]
pub trait ScpiBus: Send + Sync {
    /// Send a query and return the instrument's response, trimmed.
    async fn query(&self, command: &str) -> Result<String>;

    /// Send a command that produces no response.
    async fn write(&self, command: &str) -> Result<()>;

    /// Release the underlying connection.
    ///
    /// Closing an already-closed bus is a no-op.
    async fn close(&mut self) -> Result<()>;
}

// =============================================================================
// Session clock
// =============================================================================

/// Shared start-of-session reference.
///
/// Both the sampling loop and the annotation listener derive elapsed time
/// from one clock handle created before either task starts, so sample and
/// marker timestamps are directly comparable.
#[derive(Clone, Copy, Debug)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    /// Start the clock at the current instant.
    pub fn start_now() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Seconds elapsed since the clock started.
    pub fn elapsed_s(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// `n` evenly spaced values from `start` to `stop`, endpoints included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linspace_endpoints() {
        let values = linspace(0.05, 0.30, 6);
        assert_eq!(values.len(), 6);
        assert!((values[0] - 0.05).abs() < 1e-12);
        assert!((values[5] - 0.30).abs() < 1e-12);
        assert!((values[1] - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_linspace_degenerate_counts() {
        assert!(linspace(1.0, 2.0, 0).is_empty());
        assert_eq!(linspace(1.0, 2.0, 1), vec![1.0]);
    }

    #[test]
    fn test_marker_log_partitions_by_kind() {
        let mut log = MarkerLog::default();
        log.push(Marker {
            kind: MarkerKind::Set,
            elapsed_s: 1.0,
        });
        log.push(Marker {
            kind: MarkerKind::Mark,
            elapsed_s: 2.0,
        });
        log.push(Marker {
            kind: MarkerKind::Mark,
            elapsed_s: 3.0,
        });

        let marks: Vec<f64> = log.of_kind(MarkerKind::Mark).map(|m| m.elapsed_s).collect();
        let sets: Vec<f64> = log.of_kind(MarkerKind::Set).map(|m| m.elapsed_s).collect();
        assert_eq!(marks, vec![2.0, 3.0]);
        assert_eq!(sets, vec![1.0]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_marker_kind_labels() {
        assert_eq!(MarkerKind::Mark.label(), "MARK");
        assert_eq!(MarkerKind::Set.to_string(), "SET");
    }
}
