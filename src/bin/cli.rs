//! LedgerKV CLI Client
//!
//! Talks to a running server over HTTP, or inspects a log offline.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ledgerkv::config::LogBackend;
use ledgerkv::txlog::{Event, FileTransactionLog, Replay, SqliteTransactionLog, TransactionLog};
use ledgerkv::{LedgerError, Result};
use reqwest::blocking::{Client, Response};
use reqwest::{StatusCode, Url};

/// LedgerKV CLI
#[derive(Parser, Debug)]
#[command(name = "ledgerkv-cli")]
#[command(about = "CLI for LedgerKV key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List every pair
    List,

    /// Show server health
    Health,

    /// Print every event in a transaction log, one JSON object per line
    Dump {
        /// Log file or SQLite database
        path: PathBuf,

        /// Backend that wrote the log: file or sqlite
        #[arg(short, long, default_value = "file")]
        backend: LogBackend,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let client = Client::new();

    match args.command {
        Commands::Get { key } => {
            let resp = send(client.get(key_url(&args.server, &key)?))?;
            println!("{}", body(resp)?);
        }
        Commands::Set { key, value } => {
            send(client.put(key_url(&args.server, &key)?).body(value))?;
            println!("OK");
        }
        Commands::Del { key } => {
            send(client.delete(key_url(&args.server, &key)?))?;
            println!("OK");
        }
        Commands::List => {
            let resp = send(client.get(endpoint(&args.server, &["v1", "key"])?))?;
            println!("{}", body(resp)?);
        }
        Commands::Health => {
            let resp = send(client.get(endpoint(&args.server, &["health"])?))?;
            println!("{}", body(resp)?);
        }
        Commands::Dump { path, backend } => {
            for event in load_events(&path, backend)? {
                let line = serde_json::to_string(&event)
                    .map_err(|e| LedgerError::Serialization(e.to_string()))?;
                println!("{}", line);
            }
        }
    }

    Ok(())
}

/// Build `http://{server}/{segments...}`, percent-encoding each segment
fn endpoint(server: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(&format!("http://{}/", server))
        .map_err(|e| LedgerError::Config(format!("bad server address '{}': {}", server, e)))?;
    url.path_segments_mut()
        .map_err(|_| LedgerError::Config(format!("bad server address '{}'", server)))?
        .clear()
        .extend(segments);
    Ok(url)
}

/// URL for one key; `/`, `?` and `#` in the key stay inside its segment
fn key_url(server: &str, key: &str) -> Result<Url> {
    endpoint(server, &["v1", "key", key])
}

/// Send a request, turning non-2xx statuses into errors
fn send(request: reqwest::blocking::RequestBuilder) -> Result<Response> {
    let resp = request
        .send()
        .map_err(|e| LedgerError::Network(e.to_string()))?;

    match resp.status() {
        status if status.is_success() => Ok(resp),
        StatusCode::NOT_FOUND => Err(LedgerError::KeyNotFound),
        status => {
            let message = resp.text().unwrap_or_default();
            Err(LedgerError::Network(format!("{}: {}", status, message.trim())))
        }
    }
}

fn body(resp: Response) -> Result<String> {
    resp.text().map_err(|e| LedgerError::Network(e.to_string()))
}

/// Read every event of a log offline. Never creates the medium.
fn load_events(path: &Path, backend: LogBackend) -> Result<Vec<Event>> {
    if !path.is_file() {
        return Err(LedgerError::MediumUnavailable(format!(
            "{} does not exist",
            path.display()
        )));
    }

    match backend {
        LogBackend::File => FileTransactionLog::read_all(path),
        LogBackend::Sqlite => {
            let log = SqliteTransactionLog::open(path, 64)?;
            let Replay { events, errors } = log.replay()?;
            let collected: Vec<Event> = events.iter().collect();
            if let Ok(err) = errors.recv() {
                return Err(err);
            }
            Ok(collected)
        }
    }
}
