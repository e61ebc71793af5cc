use std::process::ExitCode;

use anyhow::Context;
use agentvisor::{app, cli, config, logging};

#[tokio::main]
async fn main() -> ExitCode {
    match run_main().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("agentvisor error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run_main() -> anyhow::Result<ExitCode> {
    let args = cli::parse();
    let cfg = config::loader::load_or_default(args.config.as_deref())
        .context("loading configuration")?;
    logging::init_logging(args.log_level, &cfg.logger)?;
    app::run(cfg).await
}
