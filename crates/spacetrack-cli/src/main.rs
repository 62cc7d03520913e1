//! Space-Track CLI
//!
//! Command-line interface for querying the Space-Track catalog.

use clap::{Parser, Subcommand};
use futures::StreamExt;
use spacetrack_client::{classes, Chunk, ClientConfig, Query, QueryResponse, SpaceTrackClient};
use std::io::Write;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spacetrack")]
#[command(version, about = "Space-Track catalog CLI", long_about = None)]
struct Cli {
    /// Space-Track base URL
    #[arg(long, default_value = spacetrack_client::DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// Space-Track username
    #[arg(long, env = "SPACETRACK_IDENTITY", global = true)]
    identity: Option<String>,

    /// Space-Track password
    #[arg(long, env = "SPACETRACK_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Maximum requests per rate-limit period
    #[arg(long, default_value_t = spacetrack_client::DEFAULT_RATE_LIMIT_CALLS, global = true)]
    rate_limit: usize,

    /// Rate-limit period in seconds
    #[arg(long, default_value_t = 60, global = true)]
    rate_period_secs: u64,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List request classes and their controllers
    Classes,

    /// Show the predicates of a request class
    Predicates {
        /// Request class, e.g. gp
        class: String,
    },

    /// Query a request class
    Query {
        /// Request class, e.g. gp
        class: String,

        /// Field filter as key=value, in URL order
        #[arg(short, long = "predicate", value_parser = parse_key_value)]
        predicates: Vec<(String, String)>,

        /// Stream the response line by line
        #[arg(long, conflicts_with = "chunks")]
        lines: bool,

        /// Stream the response in chunks
        #[arg(long)]
        chunks: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Classes => {
            list_classes();
            Ok(())
        }
        Commands::Predicates { class } => show_predicates(&cli, class).await,
        Commands::Query {
            class,
            predicates,
            lines,
            chunks,
        } => run_query(&cli, class, predicates, *lines, *chunks).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_client(cli: &Cli) -> Result<SpaceTrackClient, Box<dyn std::error::Error>> {
    let identity = cli
        .identity
        .clone()
        .ok_or("--identity or SPACETRACK_IDENTITY is required")?;
    let password = cli
        .password
        .clone()
        .ok_or("--password or SPACETRACK_PASSWORD is required")?;

    let config = ClientConfig::builder(identity, password)
        .base_url(&cli.base_url)
        .rate_limit(cli.rate_limit, Duration::from_secs(cli.rate_period_secs))
        .on_rate_limit(|until| async move {
            tracing::info!(until = %until, "Waiting for the next request slot");
        })
        .build()?;

    Ok(SpaceTrackClient::new(config)?)
}

/// Parse `key=value`; the value may itself contain `=`.
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn list_classes() {
    let mut table: Vec<_> = classes::request_classes().collect();
    table.sort();

    println!("{:<20} CONTROLLER", "CLASS");
    for (class, controller) in table {
        println!("{:<20} {}", class, controller);
    }
}

async fn show_predicates(cli: &Cli, class: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = build_client(cli)?;
    let predicates = client.get_predicates(class).await?;

    println!("{:<28} {:<10} NULLABLE", "NAME", "TYPE");
    for predicate in predicates.iter() {
        let ty = if predicate.enum_values.is_empty() {
            predicate.predicate_type.to_string()
        } else {
            format!("{}({})", predicate.predicate_type, predicate.enum_values.join(","))
        };
        println!(
            "{:<28} {:<10} {}",
            predicate.name,
            ty,
            if predicate.nullable { "yes" } else { "no" }
        );
    }

    client.close();
    Ok(())
}

async fn run_query(
    cli: &Cli,
    class: &str,
    predicates: &[(String, String)],
    lines: bool,
    chunks: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = build_client(cli)?;

    let mut query = predicates
        .iter()
        .fold(Query::new(), |query, (key, value)| {
            query.predicate(key.as_str(), value.as_str())
        });
    if lines {
        query = query.iter_lines();
    }
    if chunks {
        query = query.iter_content();
    }

    let mut stdout = std::io::stdout().lock();
    match client.generic_request(class, query).await? {
        QueryResponse::Json(value) => {
            writeln!(stdout, "{}", serde_json::to_string_pretty(&value)?)?;
        }
        QueryResponse::Text(text) => stdout.write_all(text.as_bytes())?,
        QueryResponse::Bytes(bytes) => stdout.write_all(&bytes)?,
        QueryResponse::Lines(mut stream) => {
            while let Some(line) = stream.next().await {
                writeln!(stdout, "{}", line?)?;
            }
        }
        QueryResponse::Chunks(mut stream) => {
            while let Some(chunk) = stream.next().await {
                match chunk? {
                    Chunk::Text(text) => stdout.write_all(text.as_bytes())?,
                    Chunk::Binary(bytes) => stdout.write_all(&bytes)?,
                }
            }
        }
    }
    stdout.flush()?;

    client.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("norad_cat_id=25544").unwrap(),
            ("norad_cat_id".to_string(), "25544".to_string())
        );
        assert_eq!(
            parse_key_value("epoch=>now-30").unwrap(),
            ("epoch".to_string(), ">now-30".to_string())
        );
        assert_eq!(
            parse_key_value("object_name=a=b").unwrap(),
            ("object_name".to_string(), "a=b".to_string())
        );
    }

    #[test]
    fn test_parse_key_value_rejects_malformed() {
        assert!(parse_key_value("norad_cat_id").is_err());
        assert!(parse_key_value("=25544").is_err());
    }

    #[test]
    fn test_cli_parses_query() {
        let cli = Cli::try_parse_from([
            "spacetrack",
            "--identity",
            "user",
            "--password",
            "pass",
            "query",
            "gp",
            "-p",
            "norad_cat_id=25544",
            "-p",
            "format=tle",
            "--lines",
        ])
        .unwrap();

        match cli.command {
            Commands::Query {
                class,
                predicates,
                lines,
                chunks,
            } => {
                assert_eq!(class, "gp");
                assert_eq!(predicates.len(), 2);
                assert!(lines);
                assert!(!chunks);
            }
            _ => panic!("Expected query command"),
        }
    }

    #[test]
    fn test_cli_rejects_both_stream_flags() {
        let result = Cli::try_parse_from(["spacetrack", "query", "gp", "--lines", "--chunks"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_client_requires_credentials() {
        let cli = Cli::try_parse_from(["spacetrack", "--identity", "user", "classes"]).unwrap();
        if std::env::var_os("SPACETRACK_PASSWORD").is_none() {
            assert!(build_client(&cli).is_err());
        }
    }
}
