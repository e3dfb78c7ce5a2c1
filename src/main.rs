use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use robochat::commands::{self, OneShot};
use robochat::config::Config;
use robochat::transport::HttpSender;

#[derive(Parser)]
#[command(name = "robochat")]
#[command(version)]
#[command(about = "Chat with a remote assistant from the terminal", long_about = None)]
struct Cli {
    /// Chat endpoint URL (overrides config and ROBOCHAT_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and print the reply
    Send {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Clear the conversation history on the server
    Clear,
    /// Toggle between native and LangChain mode
    Mode,
    /// Write the current configuration to ~/.robochat/config.toml
    InitConfig,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    config.apply_endpoint_override(cli.endpoint);
    let _log_guard = robochat::logging::init(&config.log_dir())?;

    let sender = HttpSender::new(config.endpoint.clone(), config.request_timeout())?;

    let one_shot = match cli.command {
        None => {
            robochat::app::run_chat(&config, Arc::new(sender)).await?;
            return Ok(ExitCode::SUCCESS);
        }
        Some(Commands::InitConfig) => {
            commands::init_config(&config)?;
            return Ok(ExitCode::SUCCESS);
        }
        Some(Commands::Send { text }) => OneShot::Send(text.join(" ")),
        Some(Commands::Clear) => OneShot::Clear,
        Some(Commands::Mode) => OneShot::ToggleMode,
    };

    let accepted = commands::run_once(&sender, config.default_mode, one_shot).await?;
    Ok(if accepted {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
