use clap::Parser;

mod commands;
mod progress;

use commands::Commands;

#[derive(Parser)]
#[command(name = "scenery-cli")]
#[command(about = "Converts MSFS BGL scenery packages into a FlightGear tile tree", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    cli.command.execute()?;

    Ok(())
}
