mod aircraft;
mod cards;
mod cli;
mod cost;
mod db;
mod error;
mod expenses;
mod export;
mod flights;
mod fmt;
mod hours;
mod models;
#[cfg(feature = "pdf")]
mod pdf;
mod progress;
mod reports;
mod requirements;
mod settings;
mod templates;
mod timeline;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TRUEHOUR_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Status => cli::status::run(),
        Commands::Backup { output } => cli::backup::run(output),
        Commands::Cards { command } => cli::cards::dispatch(command),
        Commands::Expenses { command } => cli::expenses::dispatch(command),
        Commands::Aircraft { command } => cli::aircraft::dispatch(command),
        Commands::Flights { command } => cli::flights::dispatch(command),
        Commands::Hours { command } => cli::hours::dispatch(command),
        Commands::Progress { cert } => cli::progress::run(cert),
        Commands::Timeline {
            cert,
            hours_per_month,
            cost_per_hour,
        } => cli::progress::timeline(cert, hours_per_month, cost_per_hour),
        Commands::Cost {
            aircraft,
            wet,
            dry,
            owned,
            fuel_burn,
            fuel_price,
            hours,
            buffer,
        } => cli::cost::run(aircraft, wet, dry, owned, fuel_burn, fuel_price, hours, buffer),
        Commands::Report { command } => cli::report::dispatch(command),
        Commands::Export { command } => cli::export::dispatch(command),
        Commands::Settings { command } => cli::settings::dispatch(command),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "truehour", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
