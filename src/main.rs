use std::io::{self, BufWriter, Write};

use anyhow::Result;
use clap::Parser;
use tracing::info;

use oligoprobe::build::make_database;
use oligoprobe::db::Database;
use oligoprobe::query::run_query;

mod cli;

use cli::{Cli, Commands, DbCommands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Db(DbCommands::Make(args)) => {
            let db = make_database(&args.settings())?;
            db.log_details();
        }
        Commands::Db(DbCommands::Check(args)) => {
            let db = Database::open(&args.database)?;
            db.check(args.threads)?;
            info!("Database passed all checks");
        }
        Commands::Db(DbCommands::Dump(args)) => {
            let db = Database::open(&args.database)?;
            let stdout = BufWriter::new(io::stdout().lock());
            db.dump(stdout, args.chromosome.as_deref(), args.start, args.end)?;
        }
        Commands::Db(DbCommands::Info(args)) => {
            let db = Database::open(&args.database)?;
            let mut stdout = BufWriter::new(io::stdout().lock());
            db.describe(&mut stdout, args.bins)?;
            stdout.flush()?;
        }
        Commands::Query(args) => {
            let settings = args.settings().unwrap_or_else(|e| e.exit());
            let probe_sets = run_query(&settings)?;
            info!("Designed {} probe sets", probe_sets.len());
        }
    }

    Ok(())
}
