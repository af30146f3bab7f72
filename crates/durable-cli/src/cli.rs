use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "durable",
    about = "Inspect and maintain durable items across secure, scratch and settings stores",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Optional subcommand; defaults to a health check when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print version and exit.
    Version,
    /// Round-trip a sample value through every backend.
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generic-password entries in the OS keychain.
    #[command(subcommand)]
    Secret(SecretCommand),
    /// Files in the scratch directory.
    #[command(subcommand)]
    Scratch(ItemCommand),
    /// Keys in the settings domain.
    #[command(subcommand)]
    Settings(ItemCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SecretCommand {
    Get { account: String },
    Set { account: String, value: String },
    Delete { account: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ItemCommand {
    /// Print the stored value as JSON.
    Get {
        name: String,
        /// JSON returned when nothing usable is stored.
        #[arg(long, default_value = "null")]
        default: String,
    },
    /// Store a value. Input that is not valid JSON is stored as a string.
    Set { name: String, value: String },
    /// Clear the stored value.
    Remove { name: String },
}
