//! SnapLink CLI
//!
//! Command-line interface for SnapLink - curate links and share the public ones.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use snaplink_core::Config;

mod app;
mod clipboard;
mod commands;
mod output;
mod prompt;

use app::App;
use commands::share::ShareArgs;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "snaplink")]
#[command(about = "SnapLink - Curate links and share the public ones")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Signup {
        /// Display name shown on your share page
        name: String,
        email: String,
        /// Password (prompted for, or read from SNAPLINK_PASSWORD, when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign in to an existing account
    Login {
        email: String,
        /// Password (prompted for, or read from SNAPLINK_PASSWORD, when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Manage your links
    Link {
        #[command(subcommand)]
        command: LinkCommands,
    },
    /// Show a share page the way visitors see it
    Share {
        /// User ID of the page owner (defaults to you)
        user_id: Option<String>,
        /// Name shown on the page
        user_name: Option<String>,
        /// Copy the share link to the clipboard
        #[arg(short, long)]
        copy: bool,
        /// Keep following the page until interrupted
        #[arg(short, long)]
        watch: bool,
    },
    /// Manage your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum LinkCommands {
    /// Add one or more links (saved as private)
    #[command(alias = "create")]
    Add {
        /// URLs to save
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// List your links
    #[command(alias = "ls")]
    List {
        /// Only show public links
        #[arg(long)]
        public: bool,
    },
    /// Switch a link between public and private
    Toggle {
        /// Link ID (full ID or prefix)
        id: String,
    },
    /// Delete a link
    #[command(alias = "rm")]
    Delete {
        /// Link ID (full ID or prefix)
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Open a link in the browser
    Open {
        /// Link ID (full ID or prefix)
        id: String,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Upload a profile picture
    Picture {
        /// Image file
        path: PathBuf,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, origin, copy_reset_ms, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work without opening the stores
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), &output);
    }

    let config = Config::load().context("Failed to load configuration")?;
    debug!(data_dir = ?config.data_dir, "Loaded configuration");
    let app = App::open(config)?;

    match cli.command {
        Commands::Signup {
            name,
            email,
            password,
        } => commands::auth::signup(&app, name, email, password, &output).await,
        Commands::Login { email, password } => {
            commands::auth::login(&app, email, password, &output).await
        }
        Commands::Logout => commands::auth::logout(&app, &output).await,
        Commands::Whoami => commands::auth::whoami(&app, &output),
        Commands::Link { command } => handle_link_command(command, &app, &output).await,
        Commands::Share {
            user_id,
            user_name,
            copy,
            watch,
        } => {
            let args = ShareArgs {
                user_id,
                user_name,
                copy,
                watch,
            };
            commands::share::show(&app, args, &output).await
        }
        Commands::Profile {
            command: ProfileCommands::Picture { path },
        } => commands::profile::picture(&app, path, &output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

async fn handle_link_command(command: LinkCommands, app: &App, output: &Output) -> Result<()> {
    match command {
        LinkCommands::Add { urls } => commands::link::add(app, urls, output).await,
        LinkCommands::List { public } => commands::link::list(app, public, output).await,
        LinkCommands::Toggle { id } => commands::link::toggle(app, id, output).await,
        LinkCommands::Delete { id, yes } => commands::link::delete(app, id, yes, output).await,
        LinkCommands::Open { id } => commands::link::open(app, id, output).await,
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}

/// Log to stderr so command output stays clean
///
/// RUST_LOG takes precedence over the verbosity flag.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("snaplink_core={},snaplink={}", level, level)));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
