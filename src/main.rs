//! Command-line entry point for the acquisition pipelines.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use fmr_daq::acquisition;
use fmr_daq::config::Settings;
use fmr_daq::instrument::VisaBus;
use fmr_daq::sweep::{self, field::StubFieldController};

#[derive(Parser)]
#[command(name = "fmr_daq", version, about = "Lock-in logging and VNA field-sweep acquisition")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log lock-in readings until the duration elapses or the console stops the run.
    Lockin,
    /// Sweep the field and export S-parameter magnitudes per setpoint.
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;
    settings.validate()?;

    match cli.command {
        Command::Lockin => {
            let bus = VisaBus::open(&settings.lockin.resource).await?;
            println!(
                "Type 'm' + Enter to mark a field switch, 'n' + Enter for a set point, \
                 or just Enter to stop."
            );
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            let artifacts = acquisition::run_lockin(&settings, bus, input).await?;
            info!(
                "logged {} samples to {}",
                artifacts.samples.len(),
                artifacts.log_path.display()
            );
        }
        Command::Sweep => {
            let bus = VisaBus::open(&settings.vna.resource).await?;
            let mut field = StubFieldController::default();
            let artifacts = sweep::run_sweep(&settings, bus, &mut field).await?;
            info!(
                "captured {} traces; table at {}",
                artifacts.sweep.traces.len(),
                artifacts.table_path.display()
            );
        }
    }
    Ok(())
}
