use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use jobless::cli::{build_cli, shell_handler};
use jobless::common::{init_logging, load_config, parse_kinds, spawn_signal_handler};
use jobless::{AppContext, ShutdownManager};
use jobless_core::AppConfig;
use jobless_worker::WorkerExit;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let config = load_config(matches.get_one::<String>("config").map(String::as_str))?;
    let log_level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| config.observability.log_level.clone());
    let log_format = matches
        .get_one::<String>("log-format")
        .cloned()
        .unwrap_or_else(|| config.observability.log_format.clone());

    match matches.subcommand() {
        Some(("config", _)) => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Some(("register", sub)) => {
            init_logging(&log_level, &log_format)?;
            register(config, sub).await
        }
        Some(("work", sub)) => {
            init_logging(&log_level, &log_format)?;
            let kinds = parse_kinds(required(sub, "kinds")?);
            if kinds.is_empty() {
                return Err(anyhow!("--kinds needs at least one job kind"));
            }
            run(config, sub, Some(kinds)).await
        }
        Some(("task", sub)) => {
            init_logging(&log_level, &log_format)?;
            run(config, sub, None).await
        }
        Some((other, _)) => Err(anyhow!("unknown command: {other}")),
        None => Err(anyhow!("no command given")),
    }
}

async fn register(config: AppConfig, sub: &ArgMatches) -> Result<()> {
    let kind = required(sub, "kind")?;
    let raw_payload = required(sub, "payload")?;
    let payload: serde_json::Value = serde_json::from_str(raw_payload)
        .with_context(|| format!("payload is not valid JSON: {raw_payload}"))?;

    let app = AppContext::builder(config).build().await?;
    let job = app.register_job(kind, payload).await?;
    info!("Registered {}", job.entity_description());
    println!("{}", job.id);

    app.close().await;
    Ok(())
}

async fn run(config: AppConfig, sub: &ArgMatches, kinds: Option<Vec<String>>) -> Result<()> {
    let handler = Arc::new(shell_handler(sub)?);

    let app = AppContext::builder(config).build().await?;
    let shutdown_manager = ShutdownManager::new();
    let shutdown_rx = shutdown_manager.subscribe().await;
    spawn_signal_handler(shutdown_manager);

    let exit = match kinds {
        Some(kinds) => app.run_worker(kinds, handler, shutdown_rx).await,
        None => app.task(handler, shutdown_rx).await,
    };
    app.close().await;

    match exit {
        WorkerExit::Finished | WorkerExit::Shutdown => Ok(()),
        WorkerExit::Failed(message) => Err(anyhow!(message)),
    }
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument: {id}"))
}
