use anyhow::Result;
use clap::Parser;
use log::{error, info};

use velum::config::Config;
use velum::shell::Shell;

#[derive(Parser)]
#[command(name = "velum")]
#[command(about = "Tiling Wayland compositor core with transactional layout")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/velum/velum.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Disable animations (performance mode)
    #[arg(long)]
    no_animations: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    velum::logging::init(cli.debug);

    info!("starting velum {}", velum::VERSION);

    let mut config = match Config::load(&cli.config) {
        Ok(config) => {
            info!("configuration loaded from {}", cli.config);
            config
        }
        Err(e) => {
            error!("failed to load configuration: {:#}", e);
            info!("using default configuration");
            Config::default()
        }
    };
    if cli.no_animations {
        config.animation.enabled = false;
        info!("animations disabled via CLI flag");
    }

    let shell = Shell::new(config);
    shell.run()
}
