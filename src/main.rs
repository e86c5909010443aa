use anyhow::Result;
use clap::Parser;
use meetbot::{
    app,
    cli::{Cli, CliCommand},
    config::Config,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        CliCommand::Version => {
            println!("meetbot {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCommand::Join(args) => {
            let config = Config::load(cli.config.as_deref())?;
            app::run_bot(args, config).await?;
            Ok(())
        }
        CliCommand::Serve(args) => {
            let config = Config::load(cli.config.as_deref())?;
            app::run_server(args, config, cli.config).await
        }
    }
}
