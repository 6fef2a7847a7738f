//! # Sett CLI
//!
//! Small command-line front end over a Sett database file, mainly for
//! inspecting and seeding tables by hand.
//!
//! ## Design Principles
//!
//! 1. **Env Configured**: The store is opened from `SETT_*` variables; flags
//!    only pick the table and TTL.
//! 2. **Async Shell**: Commands go through the engine's async wrappers so the
//!    runtime never blocks on storage.
//! 3. **Quiet Stdout**: Results go to stdout, logs go to stderr.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sett_engine::{Options, RedbStore, Sett, SettError, Table};

/// Inspect and edit a Sett database (opened from SETT_PATH).
#[derive(Parser, Debug)]
#[command(name = "sett")]
#[command(version)]
#[command(about = "Tables, TTLs and typed values over a redb file", long_about = None)]
struct Invocation {
    /// Table to operate on (default: the root table)
    #[arg(long, global = true)]
    table: Option<String>,

    /// Expire values written by this command after N milliseconds
    #[arg(long = "ttl-ms", global = true)]
    ttl_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Print the value (strings raw, anything else as JSON)
    Get { key: String },
    /// Store a string
    Set { key: String, value: String },
    /// Store a JSON value
    SetJson { key: String, json: String },
    /// Store a string under a generated key and print the key
    Insert { value: String },
    /// Print and remove the value
    Cut { key: String },
    /// Remove the key
    Del { key: String },
    /// List live keys, optionally only those starting with PREFIX
    Keys { prefix: Option<String> },
    /// Remove every entry of the table
    Drop,
    /// Remove expired entries across all tables
    Purge,
}

impl Invocation {
    fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or("")
    }

    fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }
}

async fn run(sett: &Sett<RedbStore>, invocation: Invocation) -> Result<()> {
    let mut table = sett.table(invocation.table_name());
    if let Some(ttl) = invocation.ttl() {
        table = table.with_ttl(ttl);
    }

    match invocation.command {
        Command::Get { key } => {
            let text = read_value(&table, key, false).await?;
            println!("{text}");
        }
        Command::Set { key, value } => {
            table.set_str_async(key, value).await?;
        }
        Command::SetJson { key, json } => {
            let value: Value = serde_json::from_str(&json).context("value is not valid JSON")?;
            table.set_async(key, value).await?;
        }
        Command::Insert { value } => {
            let key = table.insert_str_async(value).await?;
            println!("{key}");
        }
        Command::Cut { key } => {
            let text = read_value(&table, key, true).await?;
            println!("{text}");
        }
        Command::Del { key } => {
            table.delete_async(key).await?;
        }
        Command::Keys { prefix } => {
            for key in table.keys_async(prefix).await? {
                println!("{key}");
            }
        }
        Command::Drop => {
            let removed = table.drop_async().await?;
            info!(table = %table.name(), removed, "table dropped");
        }
        Command::Purge => {
            let removed = sett.purge_expired_async().await?;
            info!(removed, "expired entries purged");
        }
    }
    Ok(())
}

/// Reads `key` as a string, falling back to JSON for structured values.
async fn read_value(table: &Table<RedbStore>, key: String, remove: bool) -> Result<String> {
    let as_str = if remove {
        table.cut_str_async(key.clone()).await
    } else {
        table.get_str_async(key.clone()).await
    };
    match as_str {
        Ok(text) => Ok(text),
        Err(SettError::Deserialize(_)) => {
            let value: Value = if remove {
                table.cut_async(key).await?
            } else {
                table.get_async(key).await?
            };
            Ok(value.to_string())
        }
        Err(SettError::NotFound) => bail!("key {key:?} not found"),
        Err(err) => Err(err.into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let invocation = Invocation::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = Options::from_env().context("invalid SETT_* configuration")?;
    let sett = Sett::open(options).context("failed to open store")?;

    let result = run(&sett, invocation).await;
    sett.close();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Invocation, clap::Error> {
        Invocation::try_parse_from(std::iter::once("sett").chain(args.iter().copied()))
    }

    #[test]
    fn cli_definition_is_consistent() {
        Invocation::command().debug_assert();
    }

    #[test]
    fn parses_flags_in_any_position() {
        let invocation = parse(&["set", "--table", "users", "k", "v", "--ttl-ms", "500"]).unwrap();
        assert_eq!(invocation.table_name(), "users");
        assert_eq!(invocation.ttl(), Some(Duration::from_millis(500)));
        assert_eq!(
            invocation.command,
            Command::Set {
                key: "k".into(),
                value: "v".into()
            }
        );

        let invocation = parse(&["--table", "users", "keys", "user:"]).unwrap();
        assert_eq!(invocation.table_name(), "users");
        assert_eq!(
            invocation.command,
            Command::Keys {
                prefix: Some("user:".into())
            }
        );
    }

    #[test]
    fn defaults_to_root_table() {
        let invocation = parse(&["keys"]).unwrap();
        assert_eq!(invocation.table_name(), "");
        assert_eq!(invocation.ttl(), None);
        assert_eq!(invocation.command, Command::Keys { prefix: None });
    }

    #[test]
    fn subcommand_names_are_kebab_case() {
        let invocation = parse(&["set-json", "k", r#"{"a":1}"#]).unwrap();
        assert_eq!(
            invocation.command,
            Command::SetJson {
                key: "k".into(),
                json: r#"{"a":1}"#.into()
            }
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["get"]).is_err());
        assert!(parse(&["frobnicate"]).is_err());
        assert!(parse(&["--ttl-ms", "soon", "drop"]).is_err());
        assert!(parse(&["del", "a", "b"]).is_err());
    }
}
