use clap::Parser;
use std::process::ExitCode;
use suivi_dashboard::args::{Args, Command};
use suivi_dashboard::{commands, Config, Result};
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().suivi_home().path();

    let _: () = match args.command() {
        Command::Init(init_args) => {
            commands::init(home, init_args.display(), init_args.script())
                .await?
                .print()
        }

        Command::Extract(period) => {
            let config = Config::load(home).await?;
            commands::extract(&config, period).await?.print()
        }

        Command::Run(period) => {
            let config = Config::load(home).await?;
            commands::run(&config, period).await?.print()
        }

        Command::Billing(period) => {
            let config = Config::load(home).await?;
            commands::billing(&config, period).await?.print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        // RUST_LOG wins when it is set.
        Some(_) => EnvFilter::from_default_env(),
        None => EnvFilter::new(format!(
            "{}={},{}={}",
            env!("CARGO_CRATE_NAME"),
            level,
            env!("CARGO_BIN_NAME"),
            level
        )),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
