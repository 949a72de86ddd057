//! Out-of-band admin entry point.
//!
//! # Responsibility
//! - Seed sites, which the HTTP API cannot create.
//! - Inspect stored sites/items without running the server.
//! - Print JSON on stdout; failures print `{ "error": ... }` and exit non-zero.

use clap::{Parser, Subcommand};
use log::info;
use mu_core::{init_logging, Config, ItemDirectory, NewSite, SqliteSiteRepository};
use serde_json::{json, Value};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[clap(name = "mu_cli", version = env!("CARGO_PKG_VERSION"), about = "Admin tool for the Mu site store")]
struct Cli {
    /// SQLite database file. Defaults to `MU_API_DB_PATH`.
    #[clap(long, global = true)]
    db: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new site
    SeedSite {
        #[clap(long)]
        reference: String,
        #[clap(long, default_value = "")]
        url: String,
        #[clap(long, default_value = "")]
        title: String,
        #[clap(long, default_value = "")]
        admin: String,
        #[clap(long)]
        security: bool,
    },
    /// List every site
    ListSites,
    /// Show one site
    GetSite { reference: String },
    /// List a site's items in stored order
    ListItems { reference: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{:#}", json!({ "error": err.to_string() }));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Value, Box<dyn Error>> {
    let config = Config::from_env()?;
    init_logging(&config.log)?;

    let db_path = cli
        .db
        .or(config.db_path)
        .ok_or("no database path; pass --db or set MU_API_DB_PATH")?;
    let repo = SqliteSiteRepository::open(&db_path)?;
    let directory = ItemDirectory::new(repo, config.merge_policy);
    info!(
        "event=cli_command module=cli status=start db={}",
        db_path.display()
    );

    let output = match cli.command {
        Command::SeedSite {
            reference,
            url,
            title,
            admin,
            security,
        } => {
            let site = directory.create_site(NewSite {
                reference,
                url,
                title,
                admin,
                security,
            })?;
            serde_json::to_value(site)?
        }
        Command::ListSites => serde_json::to_value(directory.list_sites()?)?,
        Command::GetSite { reference } => serde_json::to_value(directory.get_site(&reference)?)?,
        Command::ListItems { reference } => {
            serde_json::to_value(directory.list_items(&reference)?)?
        }
    };
    Ok(output)
}
