use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use snafu::ResultExt;
use tracing_subscriber::EnvFilter;
use zhifa_core::{LegalDomain, Settings, credential_from_env};

mod app;
mod command;
mod render;

use app::{AppError, ChatApp, ClientSnafu, SettingsSnafu};

/// Terminal client for the 智法 LawGPT legal assistant.
#[derive(Debug, Parser)]
#[command(name = "zhifa", version, about, long_about = None)]
struct Args {
    /// Legal domain to start with (general, civil, criminal, commercial, admin, ip).
    #[arg(short, long, default_value = "general")]
    domain: LegalDomain,

    /// Settings file; defaults to the per-user config directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter such as `info` or `zhifa_llm=debug`. Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,

    /// Ask a single question, print the answer and exit.
    #[arg(long, value_name = "QUESTION")]
    once: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    match run(args).await {
        Ok(code) => code,
        Err(error) => {
            tracing::error!(error = %error, "zhifa exited with an error");
            eprintln!("zhifa: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, AppError> {
    let settings = Settings::load(args.config.as_deref()).context(SettingsSnafu {
        stage: "load-settings",
    })?;

    let api_key = credential_from_env();
    if api_key.is_none() {
        tracing::warn!("no API_KEY or GEMINI_API_KEY set, requests will fail");
    }
    tracing::info!(
        model_id = %settings.model_id,
        endpoint = %settings.endpoint,
        grounding = settings.grounding_enabled,
        "starting chat client"
    );

    let client = zhifa_core::connect(&settings, api_key).context(ClientSnafu {
        stage: "connect",
    })?;
    let mut app = ChatApp::new(client, args.domain);

    match args.once {
        Some(question) => {
            let succeeded = app.ask_once(&question).await?;
            Ok(if succeeded {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        None => {
            app.run_interactive().await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Logs go to stderr so stdout carries only the conversation.
fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|error| {
            eprintln!("zhifa: ignoring invalid log filter '{level}': {error}");
            EnvFilter::new("warn")
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
