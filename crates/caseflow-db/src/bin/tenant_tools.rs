//! tenant-tools: Command-line tool for tenant schema administration.
//!
//! Lists tenant schemas and applies migrations to each of them. Output is
//! line-oriented so it composes with shell pipelines; the process exits 0
//! on success and 1 on any failure.

use clap::{Parser, Subcommand};
use sqlx::{Connection, Executor, PgConnection, Row};
use std::process::ExitCode;

/// Schemas created per tenant carry this prefix.
const TENANT_SCHEMA_PREFIX: &str = "tenant_";

#[derive(Parser)]
#[command(name = "tenant-tools")]
#[command(author, version, about = "Tenant schema administration for caseflow")]
#[command(propagate_version = true)]
struct Cli {
    /// Database URL (falls back to DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tenant schemas in the database
    FindSchemas,

    /// Apply pending migrations to every tenant schema
    UploadMigrations {
        /// Only apply to a single schema
        #[arg(long)]
        schema: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let url = match cli.database_url {
        Some(url) => url,
        None => std::env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL is not set and --database-url was not given")?,
    };

    let mut conn = PgConnection::connect(&url).await?;

    match cli.command {
        Commands::FindSchemas => {
            for schema in find_tenant_schemas(&mut conn).await? {
                println!("{}", schema);
            }
        }
        Commands::UploadMigrations { schema } => {
            let schemas = match schema {
                Some(s) => {
                    if !is_valid_schema_name(&s) {
                        return Err(format!("invalid schema name: {}", s).into());
                    }
                    vec![s]
                }
                None => find_tenant_schemas(&mut conn).await?,
            };

            if schemas.is_empty() {
                println!("no tenant schemas found");
                return Ok(());
            }

            let migrator = sqlx::migrate!("../../migrations");
            for schema in schemas {
                // search_path scopes both the migration DDL and the
                // _sqlx_migrations bookkeeping table to the tenant.
                conn.execute(format!("SET search_path TO \"{}\"", schema).as_str())
                    .await?;
                migrator.run(&mut conn).await?;
                println!("{} ok", schema);
            }
        }
    }

    Ok(())
}

async fn find_tenant_schemas(
    conn: &mut PgConnection,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let rows = sqlx::query(
        "SELECT schema_name FROM information_schema.schemata
         WHERE schema_name LIKE $1 ORDER BY schema_name",
    )
    .bind(format!("{}%", TENANT_SCHEMA_PREFIX))
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| r.get::<String, _>("schema_name"))
        .collect())
}

/// Schema names come from the database or the operator; still refuse
/// anything that could break out of the quoted SET statement.
fn is_valid_schema_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_name_validation() {
        assert!(is_valid_schema_name("tenant_acme"));
        assert!(is_valid_schema_name("tenant_1"));
        assert!(!is_valid_schema_name(""));
        assert!(!is_valid_schema_name("1tenant"));
        assert!(!is_valid_schema_name("tenant\"; DROP TABLE cases;--"));
        assert!(!is_valid_schema_name(&"x".repeat(64)));
    }
}
