//! WorkOrderWizard CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! wow-cli migrate
//!
//! # Load demo users, work orders, logs and payments
//! wow-cli seed
//!
//! # Create a user linked to a Firebase account
//! wow-cli user create -e admin@example.com -n "Admin Name" -u <firebase-uid> -r admin
//! ```
//!
//! All commands read `DATABASE_URL` (a `.env` file is honoured).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "wow-cli")]
#[command(author, version, about = "WorkOrderWizard CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database with demo data
    Seed,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Firebase uid the user signs in with
        #[arg(short = 'u', long)]
        firebase_uid: String,

        /// Role (`admin`, `worker`)
        #[arg(short, long, default_value = "worker")]
        role: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed => commands::seed::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                firebase_uid,
                role,
            } => {
                commands::user::create(&email, &name, &firebase_uid, &role).await?;
            }
        },
    }
    Ok(())
}
