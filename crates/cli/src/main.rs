use clap::Parser;

mod cli;
mod commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockledger_observability::init();
    let cli = cli::Cli::parse();
    commands::run_command(cli).await
}
