use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use pos_lv2::config::{ConfigError, Settings};
use pos_lv2::pos_db;
use pos_lv2::schema_doctor;

/// Report drift between the SQLite database and the POS schema, optionally fixing it
#[derive(Parser, Debug)]
#[command(name = "pos-schema-doctor", version, about)]
struct Args {
    /// Apply the fixes (without this flag nothing is changed)
    #[arg(long)]
    apply: bool,

    /// Database URL or path (defaults to DATABASE_URL / the server's fallback)
    #[arg(long)]
    database: Option<String>,
}

fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv_override().ok();
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pos_lv2=info")),
        )
        .init();

    let mut settings = Settings::from_env()?;
    if let Some(url) = args.database {
        settings.database.url = Some(url);
    }
    let location = match settings.database_location() {
        Ok(location) => location,
        Err(ConfigError::UnsupportedDatabase(scheme)) => {
            println!("This tool supports SQLite only. Current URL scheme: {scheme}");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!("checking schema of {location}");

    let conn = pos_db::connect(&location)?;
    let actions = schema_doctor::plan(&conn)?;
    if actions.is_empty() {
        println!("No actions needed.");
        return Ok(ExitCode::SUCCESS);
    }

    println!("Planned actions:");
    for action in &actions {
        println!(" - {action}");
    }
    if args.apply {
        for line in schema_doctor::apply(&conn, &actions)? {
            println!(" - {line}");
        }
    } else {
        println!("(dry run; pass --apply to execute)");
    }
    Ok(ExitCode::SUCCESS)
}
