//! kioskd - unattended panoramic video kiosk daemon

use std::path::PathBuf;

use clap::Parser;

use kiosk_runtime::{init_logging, run_daemon, KioskConfig};

#[derive(Parser, Debug)]
#[command(name = "kioskd", version, about = "Unattended panoramic video kiosk controller")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "/etc/kioskd/kioskd.toml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_default_config: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.print_default_config {
        print!("{}", KioskConfig::default().to_toml()?);
        return Ok(());
    }

    let config = KioskConfig::load(&cli.config)?;
    config.validate()?;
    if cli.check_config {
        println!("{}: ok", cli.config.display());
        return Ok(());
    }

    init_logging(&config.logging)?;
    if !cli.config.exists() {
        tracing::warn!(path = %cli.config.display(), "config file not found, using defaults");
    }

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let stats = runtime.block_on(run_daemon(config))?;
    tracing::info!(
        samples = stats.samples,
        transitions = stats.transitions,
        repairs = stats.watchdog_repairs,
        updates = stats.updates_installed,
        "kioskd exiting"
    );
    Ok(())
}
