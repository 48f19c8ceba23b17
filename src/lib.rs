//! Core library for the fmr_daq acquisition tools.
//!
//! This library contains the core traits, data structures, instrument
//! drivers, and post-processing stages for two laboratory pipelines: a
//! lock-in amplifier logging session and a VNA field-sweep session. It is
//! used by the `fmr_daq` command-line binary.

pub mod acquisition;
pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod instrument;
pub mod plot;
pub mod sweep;
