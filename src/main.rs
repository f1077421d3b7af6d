//! gwmind - run the demo mind
//!
//! Usage:
//!   gwmind                         → run with ./gwmind.toml (or defaults)
//!   gwmind --config my.toml        → run with a specific config
//!   gwmind --run-secs 10           → override the run duration
//!   gwmind --dump-config           → print the default config and exit

use clap::Parser;
use gwmind::{Demo, GwmindConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "gwmind",
    about = "Codelet runtime with a behavior-network demo",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(long, default_value = "gwmind.toml")]
    config: PathBuf,

    /// Dump default config as TOML and exit.
    #[arg(long)]
    dump_config: bool,

    /// Run duration in seconds (overrides the config file)
    #[arg(long)]
    run_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.dump_config {
        println!("{}", GwmindConfig::default().to_toml());
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gwmind=info,gwmind_codelet=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = GwmindConfig::load(&cli.config);
    if let Some(secs) = cli.run_secs {
        config.runtime.run_secs = secs;
    }
    config.validate()?;

    let demo = Demo::build(&config);
    demo.mind.start();

    tokio::select! {
        _ = tokio::time::sleep(config.run_duration()) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
        }
    }

    demo.mind.shut_down_and_wait().await;
    print!("{}", demo.summary());

    Ok(())
}
