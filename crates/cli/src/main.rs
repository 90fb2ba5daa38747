//! Order service CLI - schema bootstrap and order tools.
//!
//! # Usage
//!
//! ```bash
//! # Create the order tables if they do not exist
//! order-cli schema init
//!
//! # Print a stored order as JSON
//! order-cli order get b563feb7b2b84b6test
//!
//! # Save an order from a JSON file
//! order-cli order import order.json
//! ```
//!
//! # Commands
//!
//! - `schema init` - Create the order schema
//! - `order get` - Fetch an order from the database
//! - `order import` - Save an order read from a JSON file

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "order-cli")]
#[command(author, version, about = "Order service CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the database schema
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
    /// Inspect and import orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum SchemaAction {
    /// Create the order tables and indexes if they do not exist
    Init,
}

#[derive(Subcommand)]
enum OrderAction {
    /// Print a stored order as pretty JSON
    Get {
        /// Order identifier
        order_id: String,
    },
    /// Save an order read from a JSON file
    Import {
        /// Path to the JSON order
        file: PathBuf,
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
    match cli.command {
        Commands::Schema { action } => match action {
            SchemaAction::Init => commands::schema::init().await?,
        },
        Commands::Order { action } => match action {
            OrderAction::Get { order_id } => commands::order::get(&order_id).await?,
            OrderAction::Import { file } => commands::order::import(&file).await?,
        },
    }
    Ok(())
}
