//! Vigil CLI - observe a codebase through its scanner plugins and keep
//! project identities consistent across inventory, registry and database.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use vigil_identity::Resolution;

mod commands;
mod config;

use commands::identity::ReconcileOptions;
use commands::{config as config_cmd, identity, introspect, scanners};
use config::Config;

/// Vigil CLI - scanner registry and project identity tooling.
#[derive(Parser, Debug)]
#[command(
    name = "vigil",
    author,
    version,
    about = "Vigil: scanner registry introspection and project identity reconciliation",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Scanner root directory (overrides config).
    #[arg(long, global = true, env = "VIGIL_ROOT")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List or run scanners.
    #[command(subcommand)]
    Scanners(ScannerCommands),

    /// Show registered scanners, load issues and manifest drift.
    Introspect {
        /// Emit the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Canonical keys, identifiers and registry reconciliation.
    #[command(subcommand)]
    Identity(IdentityCommands),

    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ScannerCommands {
    /// List registered scanners.
    List {
        /// Only this category.
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Run a scanner and print its findings as JSON.
    Run {
        /// Scanner name.
        name: String,

        /// Path to scan (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum IdentityCommands {
    /// Print the canonical key and minted id for a repository URL or key.
    Key {
        /// URL (`https://github.com/owner/repo`) or key (`github:owner/repo`).
        input: String,
    },

    /// Reconcile inventory, local registry and database snapshot.
    Reconcile {
        /// Inventory JSON file.
        #[arg(long)]
        inventory: Option<PathBuf>,

        /// Registry file to reconcile against.
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Database snapshot JSON file.
        #[arg(long)]
        database: Option<PathBuf>,

        /// Persist the reconciled registry.
        #[arg(long)]
        write: bool,

        /// Write the patch plan to this file.
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Emit the reconciliation as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Resolve one frozen identity.
    #[command(group(ArgGroup::new("resolution").required(true).args(["accept_minted", "acknowledge"])))]
    Adjudicate {
        /// Canonical key or URL of the frozen project.
        key: String,

        /// Replace the stored id with the minted one.
        #[arg(long)]
        accept_minted: bool,

        /// Keep the stored id and mark the conflict as reviewed.
        #[arg(long)]
        acknowledge: bool,

        /// Registry file to edit.
        #[arg(long)]
        registry: Option<PathBuf>,
    },
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration.
    Show,

    /// Set a configuration value.
    Set {
        /// Configuration key.
        key: String,
        /// Configuration value.
        value: String,
    },

    /// Get a configuration value.
    Get {
        /// Configuration key.
        key: String,
    },

    /// Reset configuration to defaults.
    Reset,

    /// Show path to config file.
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    // RUST_LOG wins over the flags when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load()?;
    if let Some(root) = cli.root {
        config.scanners_root = Some(root);
    }

    match cli.command {
        Commands::Scanners(cmd) => match cmd {
            ScannerCommands::List { category } => {
                scanners::list(&config, category.as_deref())?;
            }
            ScannerCommands::Run { name, path } => {
                scanners::run(&config, &name, &path)?;
            }
        },

        Commands::Introspect { json } => {
            introspect::execute(&config, json)?;
        }

        Commands::Identity(cmd) => match cmd {
            IdentityCommands::Key { input } => {
                identity::key(&input)?;
            }
            IdentityCommands::Reconcile {
                inventory,
                registry,
                database,
                write,
                plan,
                json,
            } => {
                identity::reconcile(
                    &config,
                    ReconcileOptions {
                        inventory,
                        registry,
                        database,
                        write,
                        plan,
                        json,
                    },
                )?;
            }
            IdentityCommands::Adjudicate {
                key,
                accept_minted,
                acknowledge: _,
                registry,
            } => {
                let resolution = if accept_minted {
                    Resolution::AcceptMinted
                } else {
                    Resolution::Acknowledge
                };
                identity::adjudicate(&config, &key, resolution, registry)?;
            }
        },

        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => {
                config_cmd::show(&config)?;
            }
            ConfigCommands::Set { key, value } => {
                // Persist file values only, not env or flag overrides.
                let mut stored = Config::load_file()?;
                config_cmd::set(&mut stored, &key, &value)?;
            }
            ConfigCommands::Get { key } => {
                config_cmd::get(&config, &key)?;
            }
            ConfigCommands::Reset => {
                config_cmd::reset()?;
            }
            ConfigCommands::Path => {
                if let Some(path) = Config::config_file_path() {
                    println!("{}", path.display());
                } else {
                    println!("(no config file path available)");
                }
            }
        },
    }

    Ok(())
}
