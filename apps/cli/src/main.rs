use clap::Parser;
use modload_cli::{Cli, bootstrap, init_logger, settings};
use std::io::Write;

#[modload_runtime::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = settings(&cli)?;
    let _log = init_logger(&config.log)?;

    let exports = bootstrap(&config).await?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", serde_json::to_string_pretty(&exports)?)?;
    Ok(())
}
