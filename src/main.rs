mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, CrdAction, LogFormat, Suite};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Version => commands::version::run()?,
        Commands::Check { config } => commands::check::run(&config).await?,
        Commands::Crd { action } => match action {
            CrdAction::Generate => commands::crd::generate()?,
            CrdAction::Install { config } => commands::crd::install(&config).await?,
        },
        Commands::WaitMessage {
            config,
            policy,
            template_index,
            matches,
            negate,
        } => {
            commands::wait::message(&config, &policy, template_index, &matches, negate).await?;
        }
        Commands::WaitCompliance {
            config,
            policy,
            state,
        } => commands::wait::compliance(&config, &policy, state).await?,
        Commands::Run { suite } => match suite {
            Suite::TemplateSyncErrors {
                config,
                suite_timeout,
            } => commands::run::template_sync_errors(config, suite_timeout).await?,
        },
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
