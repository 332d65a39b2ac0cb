//! Plant Health CLI - schema setup, user management and one-shot diagnoses.
//!
//! # Usage
//!
//! ```bash
//! # Create the users and sessions tables
//! ph-cli migrate
//!
//! # Create a user
//! ph-cli user create -u grower -e grower@example.com -p secret1
//!
//! # Show the most recent predictions
//! ph-cli history --limit 5
//!
//! # Diagnose a leaf photo without touching the network
//! ph-cli predict leaf.jpg --offline
//! ```
//!
//! # Commands
//!
//! - `migrate` - Create the credential and session tables
//! - `user create` - Register a user
//! - `history` - Print the prediction ledger, newest first
//! - `predict` - Run a diagnosis and append it to the ledger

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ph-cli")]
#[command(author, version, about = "Plant Health Assistant CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the credential and session tables
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Print recorded predictions, newest first
    History {
        /// Show at most this many records
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Diagnose a leaf photo and record the prediction
    Predict {
        /// Image file (jpg, jpeg, png or gif)
        image: PathBuf,

        /// Skip the model refresh, treatment fetch and cloud sync
        #[arg(long)]
        offline: bool,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Register a new user
    Create {
        /// Username
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (at least 6 characters)
        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = plant_health_web::config::AppConfig::from_env()?;

    match cli.command {
        Commands::Migrate => commands::migrate::run(&config).await?,
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                email,
                password,
            } => {
                commands::user::create(&config, &username, &email, password).await?;
            }
        },
        Commands::History { limit } => commands::predict::history(&config, limit).await,
        Commands::Predict { image, offline } => {
            commands::predict::predict(&config, &image, offline).await?;
        }
    }
    Ok(())
}
