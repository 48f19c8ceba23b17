//! CSV export of samples, markers, spectra, and sweep tables.
//!
//! The lock-in log is written row-by-row during acquisition so a crashed
//! run still leaves its partial data on disk. The sweep table verifies
//! every trace length against the frequency axis before the output file
//! is even created; a mismatched run produces no file at all.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;

use crate::config::VnaSettings;
use crate::core::{FieldSweep, MarkerKind, MarkerLog, Sample};
use crate::data::fft::FrequencyBin;
use crate::data::magnitude_db;
use crate::error::{AppResult, DaqError};

/// Column headers of the lock-in log.
const LOCKIN_HEADER: [&str; 6] = ["t (s)", "X (uV)", "Y (uV)", "R (uV)", "Theta (deg)", "Note"];

/// Row-by-row writer for the lock-in session log.
///
/// Every appended row is flushed immediately; readers mid-run may see a
/// partial file, which is acceptable per the storage contract.
pub struct LockinLogWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl LockinLogWriter {
    /// Create the log file at `path` and write the header row.
    pub fn create(path: &Path) -> AppResult<Self> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(LOCKIN_HEADER)?;
        writer.flush()?;
        info!("lock-in log created at '{}'", path.display());
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    /// Append one sample row, formatted to 5 decimal places, and flush.
    pub fn append_sample(&mut self, sample: &Sample) -> AppResult<()> {
        self.writer.write_record([
            format!("{:.5}", sample.elapsed_s),
            format!("{:.5}", sample.x_uv),
            format!("{:.5}", sample.y_uv),
            format!("{:.5}", sample.r_uv),
            format!("{:.5}", sample.theta_deg),
            String::new(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }

    /// Append all marker rows after the sample rows: every MARK entry,
    /// then every SET entry, each with empty measurement fields.
    pub fn append_markers(&mut self, markers: &MarkerLog) -> AppResult<()> {
        for kind in [MarkerKind::Mark, MarkerKind::Set] {
            for marker in markers.of_kind(kind) {
                self.writer.write_record([
                    format!("{:.5}", marker.elapsed_s),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    kind.label().to_string(),
                ])?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write the one-sided spectrum as a `Frequency (Hz),Magnitude` table.
pub fn write_spectrum(path: &Path, bins: &[FrequencyBin]) -> AppResult<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(["Frequency (Hz)", "Magnitude"])?;
    for bin in bins {
        writer.write_record([format!("{:.6}", bin.frequency), format!("{:.6}", bin.magnitude)])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the field-sweep table: descriptive `# ` comment rows, then one
/// frequency column plus one decibel-magnitude column per field.
///
/// Every trace length is checked against the frequency axis first; a
/// mismatch fails with [`DaqError::TraceLength`] before the file exists.
pub fn write_sweep_table(path: &Path, sweep: &FieldSweep, settings: &VnaSettings) -> AppResult<()> {
    let expected = sweep.frequencies.len();
    for trace in &sweep.traces {
        if trace.sdata.len() != expected {
            return Err(DaqError::TraceLength {
                field_t: trace.field_t,
                expected,
                actual: trace.sdata.len(),
            });
        }
    }

    let mut file = File::create(path)?;
    writeln!(file, "# Keysight E5080B Sweep Data")?;
    writeln!(
        file,
        "# Freq range: {:.3}-{:.3} GHz",
        settings.start_hz / 1e9,
        settings.stop_hz / 1e9
    )?;
    writeln!(
        file,
        "# Points: {}, Power: {} dBm, IF BW: {} Hz",
        settings.points, settings.power_dbm, settings.if_bandwidth_hz
    )?;
    writeln!(
        file,
        "# Calibration: {}",
        settings.calibration_file.as_deref().unwrap_or("none")
    )?;

    let mut writer = csv::Writer::from_writer(file);
    let mut header = vec!["Frequency (Hz)".to_string()];
    header.extend(
        sweep
            .traces
            .iter()
            .map(|t| format!("{}_mag_dB_H{:.3}T", settings.s_parameter, t.field_t)),
    );
    writer.write_record(&header)?;

    for (i, &frequency) in sweep.frequencies.iter().enumerate() {
        let mut row = vec![format!("{frequency:.3}")];
        row.extend(
            sweep
                .traces
                .iter()
                .map(|t| format!("{:.6}", magnitude_db(t.sdata[i]))),
        );
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldSettings;
    use crate::core::{Marker, SweepTrace};
    use num_complex::Complex64;

    fn vna_settings() -> VnaSettings {
        VnaSettings {
            resource: "TCPIP0::192.168.0.5::inst0::INSTR".to_string(),
            start_hz: 1.0e9,
            stop_hz: 2.0e9,
            points: 3,
            power_dbm: -5.0,
            if_bandwidth_hz: 1.0e3,
            s_parameter: "S21".to_string(),
            calibration_file: Some("cal.corr".to_string()),
            opc_timeout_s: 60.0,
            field: FieldSettings {
                start_t: 0.1,
                stop_t: 0.2,
                steps: 2,
            },
        }
    }

    #[test]
    fn test_sample_rows_round_trip_at_five_decimals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut log = LockinLogWriter::create(&path).unwrap();
        log.append_sample(&Sample {
            elapsed_s: 0.2,
            x_uv: 1.0,
            y_uv: 2.0,
            r_uv: 2.236,
            theta_deg: 63.43,
        })
        .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "t (s),X (uV),Y (uV),R (uV),Theta (deg),Note"
        );
        assert_eq!(lines.next().unwrap(), "0.20000,1.00000,2.00000,2.23600,63.43000,");
    }

    #[test]
    fn test_marker_rows_partition_mark_before_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut log = LockinLogWriter::create(&path).unwrap();

        let mut markers = MarkerLog::default();
        // Arrival order interleaves kinds; export order must not.
        markers.push(Marker {
            kind: MarkerKind::Set,
            elapsed_s: 1.0,
        });
        markers.push(Marker {
            kind: MarkerKind::Mark,
            elapsed_s: 2.0,
        });
        markers.push(Marker {
            kind: MarkerKind::Set,
            elapsed_s: 3.0,
        });
        log.append_markers(&markers).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let rows: Vec<&str> = contents.lines().skip(1).collect();
        assert_eq!(rows, vec!["2.00000,,,,,MARK", "1.00000,,,,,SET", "3.00000,,,,,SET"]);
    }

    #[test]
    fn test_sweep_table_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.csv");
        let settings = vna_settings();
        let sweep = FieldSweep {
            frequencies: settings.frequencies(),
            traces: vec![
                SweepTrace {
                    field_t: 0.1,
                    sdata: vec![Complex64::new(1.0, 0.0); 3],
                },
                SweepTrace {
                    field_t: 0.2,
                    sdata: vec![Complex64::new(0.0, 0.0); 3],
                },
            ],
        };

        write_sweep_table(&path, &sweep, &settings).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();

        assert_eq!(lines[0], "# Keysight E5080B Sweep Data");
        assert_eq!(lines[1], "# Freq range: 1.000-2.000 GHz");
        assert_eq!(lines[2], "# Points: 3, Power: -5 dBm, IF BW: 1000 Hz");
        assert_eq!(lines[3], "# Calibration: cal.corr");
        assert_eq!(
            lines[4],
            "Frequency (Hz),S21_mag_dB_H0.100T,S21_mag_dB_H0.200T"
        );
        assert_eq!(lines.len(), 5 + 3, "one data row per frequency point");
        // |z| = 1 is ~0 dB; |z| = 0 hits the epsilon floor at -240 dB.
        assert!(lines[5].starts_with("1000000000.000,0.000000,-240.000000"));
    }

    #[test]
    fn test_sweep_table_rejects_short_trace_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.csv");
        let settings = vna_settings();
        let sweep = FieldSweep {
            frequencies: settings.frequencies(),
            traces: vec![SweepTrace {
                field_t: 0.1,
                sdata: vec![Complex64::new(1.0, 0.0); 2],
            }],
        };

        let err = write_sweep_table(&path, &sweep, &settings).unwrap_err();
        assert!(matches!(err, DaqError::TraceLength { .. }), "got {err:?}");
        assert!(!path.exists(), "no output file may exist after a rejected run");
    }

    #[test]
    fn test_spectrum_table_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fft.csv");
        let bins = vec![
            FrequencyBin {
                frequency: 0.0,
                magnitude: 5.0,
            },
            FrequencyBin {
                frequency: 0.2,
                magnitude: 1.5,
            },
        ];
        write_spectrum(&path, &bins).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "Frequency (Hz),Magnitude");
        assert_eq!(lines[1], "0.000000,5.000000");
        assert_eq!(lines.len(), 3);
    }
}
