//! The bounded polling loop of the lock-in session.

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::time::sleep;

use crate::acquisition::state::RunState;
use crate::config::LockinSettings;
use crate::core::{Sample, ScpiBus, SessionClock};
use crate::data::storage::LockinLogWriter;
use crate::instrument::Sr865;

/// Poll the lock-in until the duration ceiling or a stop request.
///
/// Each iteration checks the stop flag, checks elapsed time against the
/// duration, queries the four output channels, records the sample both
/// in memory and in the log file, then sleeps for the sampling interval.
/// A failed read or row write is logged and the loop continues; that
/// tick's sample is simply absent.
pub async fn run<B: ScpiBus>(
    lockin: &Sr865<B>,
    clock: &SessionClock,
    state: &RunState,
    settings: &LockinSettings,
    log: &mut LockinLogWriter,
) -> Result<Vec<Sample>> {
    let idn = lockin
        .identify()
        .await
        .context("lock-in identification failed")?;
    info!("connected to {}", idn.trim());

    let interval = settings.sampling_interval();
    let mut samples = Vec::new();

    loop {
        if state.is_stopped() {
            info!("stop requested; ending session early");
            break;
        }
        let elapsed_s = clock.elapsed_s();
        if elapsed_s >= settings.duration_s {
            info!("duration ceiling of {} s reached", settings.duration_s);
            break;
        }

        match lockin.read_outputs().await {
            Ok(outputs) => {
                let sample = Sample {
                    elapsed_s,
                    x_uv: outputs.x_uv,
                    y_uv: outputs.y_uv,
                    r_uv: outputs.r_uv,
                    theta_deg: outputs.theta_deg,
                };
                if let Err(error) = log.append_sample(&sample) {
                    warn!("log write failed at t = {elapsed_s:.2} s: {error}");
                }
                info!(
                    "t = {:6.2} s | X = {:.2} uV, Y = {:.2} uV -> R = {:.2} uV, Theta = {:.2} deg",
                    sample.elapsed_s, sample.x_uv, sample.y_uv, sample.r_uv, sample.theta_deg
                );
                samples.push(sample);
            }
            Err(error) => warn!("read error at t = {elapsed_s:.2} s: {error:#}"),
        }

        sleep(interval).await;
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::MockBus;

    fn scripted_bus() -> MockBus {
        MockBus::new()
            .with_response("*IDN?", "Stanford_Research_Systems,SR865,003456,v1.34")
            .with_response("OUTP? 0", "1.0e-6")
            .with_response("OUTP? 1", "2.0e-6")
            .with_response("OUTP? 2", "2.236e-6")
            .with_response("OUTP? 3", "63.43")
    }

    fn settings(duration_s: f64, sampling_interval_s: f64) -> LockinSettings {
        LockinSettings {
            resource: "USB0::0xB506::0x2000::004198::INSTR".to_string(),
            sampling_interval_s,
            duration_s,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_iteration_count_follows_duration_over_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = LockinLogWriter::create(&dir.path().join("log.csv")).unwrap();
        let lockin = Sr865::new(scripted_bus());
        let clock = SessionClock::start_now();
        let state = RunState::new();

        // ceil(1.0 / 0.3) ticks: t = 0, 0.3, 0.6, 0.9.
        let samples = run(&lockin, &clock, &state, &settings(1.0, 0.3), &mut log)
            .await
            .unwrap();
        assert_eq!(samples.len(), 4);
        assert!((samples[3].elapsed_s - 0.9).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_set_stop_flag_yields_no_samples() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = LockinLogWriter::create(&dir.path().join("log.csv")).unwrap();
        let lockin = Sr865::new(scripted_bus());
        let clock = SessionClock::start_now();
        let state = RunState::new();
        state.request_stop();

        let samples = run(&lockin, &clock, &state, &settings(10.0, 0.2), &mut log)
            .await
            .unwrap();
        assert!(samples.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_read_skips_one_tick_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = LockinLogWriter::create(&dir.path().join("log.csv")).unwrap();
        let bus = scripted_bus();
        bus.push_query_error("OUTP? 0", "bus glitch");
        let lockin = Sr865::new(bus);
        let clock = SessionClock::start_now();
        let state = RunState::new();

        let samples = run(&lockin, &clock, &state, &settings(1.0, 0.2), &mut log)
            .await
            .unwrap();
        // The t = 0 tick failed; the remaining four succeeded.
        assert_eq!(samples.len(), 4);
        assert!((samples[0].elapsed_s - 0.2).abs() < 1e-9);
    }
}
