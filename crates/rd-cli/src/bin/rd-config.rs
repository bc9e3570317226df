//! Loads the settings layers, applies command-line overrides and prints the
//! effective settings as JSON.
//!
//! Exit codes: 0 on success, 2 when a locked setting was targeted, 3 on a
//! fatal validation error, 1 for anything else.

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use rd_cli::{CliError, parse_command_line_args};
use rd_settings::SettingsManager;
use rd_settings::paths::{ProfilePaths, settings_path};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut manager = SettingsManager::new(settings_path());
    manager.load_transient();
    manager
        .load_deployment_profiles(&ProfilePaths::current())
        .await?;
    let outcome = manager.load_user().await?;
    if outcome.first_run {
        tracing::info!(path = %manager.settings_path().display(), "First run");
    }

    if parse_command_line_args(&mut manager, &args)? {
        manager.save().await?;
    }

    println!("{}", serde_json::to_string_pretty(&manager.get_snapshot()?)?);
    Ok(())
}
