use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{config::load_settings, Operation, RecordManager};
use serde_json::{Map, Value};
use shared::domain::{FieldPatch, RecordFields, RecordId, RecordStatus};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
#[command(name = "records", about = "User record management")]
struct Args {
    /// Overrides the server url from records.toml / environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        status: Option<RecordStatus>,
        /// Extra attribute as key=value; value is parsed as JSON when possible.
        #[arg(long = "set", value_parser = parse_attribute)]
        extra: Vec<(String, Value)>,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        status: Option<RecordStatus>,
        #[arg(long = "set", value_parser = parse_attribute)]
        extra: Vec<(String, Value)>,
    },
    Remove {
        id: String,
    },
}

fn parse_attribute(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("attribute key is empty in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn into_map(pairs: Vec<(String, Value)>) -> Map<String, Value> {
    pairs.into_iter().collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = Some(server_url);
    }
    if let Some(timeout_secs) = args.timeout_secs {
        settings.request_timeout_secs = timeout_secs;
    }
    debug!(?settings, "resolved client settings");

    let service = settings.build_service()?;
    let manager = RecordManager::with_request_timeout(service, settings.request_timeout());

    println!("{}", render::header());
    manager.mount().await.context("failed to load records")?;

    let (operation, outcome) = match args.command {
        Command::List => (Operation::Load, Ok(None)),
        Command::Create {
            name,
            email,
            status,
            extra,
        } => {
            let fields = RecordFields {
                name,
                email,
                status,
                extra: into_map(extra),
            };
            let outcome = manager
                .create(fields)
                .await
                .map(|record| Some(format!("created {}", record.id)));
            (Operation::Create, outcome)
        }
        Command::Update {
            id,
            name,
            email,
            status,
            extra,
        } => {
            let patch = FieldPatch {
                name,
                email,
                status,
                extra: into_map(extra),
            };
            let outcome = manager
                .update(&RecordId(id), patch)
                .await
                .map(|record| Some(format!("updated {}", record.id)));
            (Operation::Update, outcome)
        }
        Command::Remove { id } => {
            let id = RecordId(id);
            let outcome = manager
                .remove(&id)
                .await
                .map(|()| Some(format!("removed {id}")));
            (Operation::Remove, outcome)
        }
    };

    let snapshot = manager.snapshot().await;
    println!("{}", render::records(&snapshot.records));
    println!("{}", render::status_line(operation, snapshot.states.get(operation)));
    manager.unmount().await;

    match outcome {
        Ok(Some(message)) => {
            println!("{message}");
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => Err(anyhow!(err).context(format!("{operation} failed"))),
    }
}
