mod cli;
mod config;
mod storage;

use crate::cli::{ConfigCommand, ItemCommand, SecretCommand};
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use durable_core::{slot::DurableSlot, storage::CredentialStore};
use durable_storage::{
    KeychainItem, ScratchDirectory, SettingsBackend, TemporaryDiskItem, UserDefaultsItem,
};
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const HEALTH_CHECK_NAME: &str = "durable/health-check";

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command.unwrap_or(cli::Command::Health) {
        cli::Command::Version => print_version(),
        cli::Command::Health => run_health_check(&config)?,
        cli::Command::Config(ConfigCommand::Init) => init_config(&config)?,
        cli::Command::Secret(cmd) => run_secret(cmd, storage::credential_store(&config))?,
        cli::Command::Scratch(cmd) => run_scratch(cmd, &storage::scratch_directory(&config))?,
        cli::Command::Settings(cmd) => run_settings(cmd, &storage::settings_backend(&config))?,
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("durable {}", env!("CARGO_PKG_VERSION"));
}

/// Runs a quick health check of every backend.
fn run_health_check(config: &config::Config) -> Result<()> {
    let report = check_backends(
        storage::credential_store(config),
        &storage::scratch_directory(config),
        &storage::settings_backend(config),
    );
    let mut failed = false;
    for (backend, outcome) in &report {
        match outcome {
            Ok(()) => println!("{backend}: ok"),
            Err(err) => {
                failed = true;
                println!("{backend}: {err}");
            }
        }
    }
    if failed {
        color_eyre::eyre::bail!("one or more backends failed the health check");
    }
    Ok(())
}

fn check_backends<S: CredentialStore>(
    credentials: S,
    scratch: &ScratchDirectory,
    settings: &SettingsBackend,
) -> Vec<(&'static str, Result<()>)> {
    let secret = KeychainItem::new(HEALTH_CHECK_NAME, credentials);
    let secret_result = run_slot_health(&secret, Some("ok".to_string()))
        .and_then(|()| secret.set(None).map_err(|e| eyre!(e.to_string())));

    let scratch_item = TemporaryDiskItem::in_directory(HEALTH_CHECK_NAME, String::new(), scratch.clone());
    let scratch_result = run_slot_health(&scratch_item, "ok".to_string());
    scratch_item.remove();

    let settings_item = UserDefaultsItem::new(HEALTH_CHECK_NAME, String::new(), settings.clone());
    let settings_result = run_slot_health(&settings_item, "ok".to_string());
    settings_item.remove();

    vec![
        ("Secret store", secret_result),
        ("Scratch files", scratch_result),
        ("Settings", settings_result),
    ]
}

fn run_slot_health<S>(slot: &S, sample: S::Value) -> Result<()>
where
    S: DurableSlot,
    S::Value: PartialEq + Clone,
{
    slot.write(sample.clone())
        .map_err(|e| eyre!(e.to_string()))?;
    let round_trip = slot.read().map_err(|e| eyre!(e.to_string()))?;

    if round_trip != sample {
        color_eyre::eyre::bail!("round-trip failed");
    }
    Ok(())
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

fn run_secret<S: CredentialStore>(cmd: SecretCommand, store: S) -> Result<()> {
    match cmd {
        SecretCommand::Get { account } => {
            let item = KeychainItem::new(account, store);
            match item.get().map_err(|e| eyre!(e.to_string()))? {
                Some(value) => println!("{value}"),
                None => println!("(none)"),
            }
        }
        SecretCommand::Set { account, value } => {
            KeychainItem::new(account, store)
                .set(Some(&value))
                .map_err(|e| eyre!(e.to_string()))?;
        }
        SecretCommand::Delete { account } => {
            KeychainItem::new(account, store)
                .set(None)
                .map_err(|e| eyre!(e.to_string()))?;
        }
    }
    Ok(())
}

fn run_scratch(cmd: ItemCommand, scratch: &ScratchDirectory) -> Result<()> {
    match cmd {
        ItemCommand::Get { name, default } => {
            let value = scratch.read(&name, parse_value(&default));
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        ItemCommand::Set { name, value } => {
            scratch.write(&name, &parse_value(&value));
            println!("{}", scratch.path_for(&name).display());
        }
        ItemCommand::Remove { name } => scratch.remove(&name),
    }
    Ok(())
}

fn run_settings(cmd: ItemCommand, settings: &SettingsBackend) -> Result<()> {
    match cmd {
        ItemCommand::Get { name, default } => {
            let value = settings.read(&name, parse_value(&default));
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        ItemCommand::Set { name, value } => settings.write(&name, &parse_value(&value)),
        ItemCommand::Remove { name } => settings.remove(&name),
    }
    Ok(())
}

/// Parse CLI input as JSON, treating anything else as a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|err| {
        warn!("input is not JSON ({err}), storing it as a string");
        Value::String(raw.to_string())
    })
}
