use anyhow::Result;
use clap::Parser;

mod cli;

use cli::commands::{
    interactive::InteractiveCommand, resume::ResumeCommand, retry::RetryCommand,
    sessions::SessionsCommand, show::ShowCommand, show_how_to_start, start::StartCommand,
};
use cli::{Cli, Commands};
use post_pilot::config::PostPilotConfig;
use post_pilot::telemetry::init_telemetry;

fn main() -> Result<()> {
    let cli = Cli::parse();

    PostPilotConfig::load_env_file()?;
    let mut config = match &cli.config {
        Some(path) => PostPilotConfig::load_from_file(path)?,
        None => PostPilotConfig::load()?,
    };
    if cli.json_logs {
        config.observability.json_logs = true;
    }
    init_telemetry(&config.observability)?;

    tokio::runtime::Runtime::new()?.block_on(async {
        match cli.command {
            None => show_how_to_start().await,
            Some(Commands::Start { session, request }) => {
                StartCommand::new(config, session, request).execute().await
            }
            Some(Commands::Resume { session, feedback }) => {
                ResumeCommand::new(config, session, feedback).execute().await
            }
            Some(Commands::Retry { session }) => RetryCommand::new(config, session).execute().await,
            Some(Commands::Show { session, json }) => {
                ShowCommand::new(config, session)
                    .with_json(json)
                    .execute()
                    .await
            }
            Some(Commands::Sessions) => SessionsCommand::new(config).execute().await,
            Some(Commands::Interactive { session, request }) => {
                InteractiveCommand::new(config, session, request)
                    .execute()
                    .await
            }
        }
    })
}
