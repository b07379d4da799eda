use anyhow::Result;
use clap::Parser;
use jaxrouter::cli::{run_cli, Cli};
use jaxrouter::logging::{init_tracing, LogConfig};

fn main() -> Result<()> {
    init_tracing(&LogConfig::from_env())?;
    let cli = Cli::parse();
    let stdout = std::io::stdout();
    run_cli(cli, &mut stdout.lock())
}
