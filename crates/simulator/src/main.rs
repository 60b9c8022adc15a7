use anyhow::{Context, Result};
use shared::config::Config;
use shared::logging::init_logging;
use script::{connection_config, Script, ScriptRunner};

mod script;

const DEFAULT_SCRIPT: &str = include_str!("../scripts/connect_and_unplug.json");

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_logging(config.logging.format);

    tracing::info!("Starting keylink simulator");

    let script = match std::env::args().nth(1) {
        Some(path) => {
            let json = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read script {}", path))?;
            tracing::info!("Replaying script {}", path);
            Script::from_json(&json)?
        }
        None => {
            tracing::info!("No script given, replaying built-in demo");
            Script::from_json(DEFAULT_SCRIPT)?
        }
    };

    let runner = ScriptRunner::new(&script, connection_config(&config.connection))?;
    let report = runner.run(&script.steps);

    if report.open_registrations > 0 {
        tracing::warn!(
            open = report.open_registrations,
            "Registrations still held at end of script"
        );
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
