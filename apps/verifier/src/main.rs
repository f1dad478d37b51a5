//! Entity verifier - command line entry point
//!
//! `run` executes the full create/update/get/list/delete scenario against a
//! backend; the other subcommands issue a single call and print the result.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use entity_client::{EntityClient, EntityId, FilePart};
use entity_verify::{config::Config, logging, run_entity_scenario, ScenarioOutcome};
use serde::Serialize;
use serde_json::Value;

#[derive(Parser)]
#[command(
    name = "entity-verify",
    about = "Verify a backend's REST entity CRUD endpoints",
    version,
    arg_required_else_help = true
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for values otherwise taken from `verify.toml` / `VERIFY__*`.
#[derive(Args, Debug, Default)]
struct GlobalArgs {
    /// Backend base URL (e.g. http://localhost:5000).
    #[arg(long, global = true)]
    url: Option<String>,
    /// API mode selector. Anything but "rest" makes `run` a no-op.
    #[arg(long, global = true)]
    api: Option<String>,
    /// Language selector of the backend under test.
    #[arg(long, global = true)]
    lang: Option<String>,
    /// Bearer token sent as the Authorization header.
    #[arg(long, global = true)]
    token: Option<String>,
    /// Extra request header as "Name: value". Repeatable.
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE", value_parser = parse_header, global = true)]
    headers: Vec<(String, String)>,
    /// Timeout in seconds for create/update calls.
    #[arg(long, global = true)]
    write_timeout: Option<u64>,
    /// Emit logs as JSON.
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the end-to-end entity scenario and print its report.
    Run {
        /// Skip the final list that checks the entity is gone after delete.
        #[arg(long, action = ArgAction::SetTrue)]
        no_verify_deleted: bool,
        /// Download the stored attachment and compare it with the upload.
        #[arg(long, action = ArgAction::SetTrue)]
        verify_file: bool,
        /// Pretty-print the JSON report.
        #[arg(long, action = ArgAction::SetTrue)]
        pretty: bool,
    },

    /// List all entities.
    List {
        #[arg(long, action = ArgAction::SetTrue)]
        pretty: bool,
    },

    /// Fetch one entity.
    Get {
        id: String,
        #[arg(long, action = ArgAction::SetTrue)]
        pretty: bool,
    },

    /// Create an entity from a JSON record.
    Create {
        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Replace an entity with a JSON record.
    Update {
        id: String,
        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Delete an entity.
    Delete { id: String },

    /// Download a stored attachment to stdout.
    File { name: String },

    /// Print CLI version.
    Version,
}

#[derive(Args)]
struct PayloadArgs {
    /// Path to the JSON record (or "-" for stdin).
    #[arg(short, long)]
    body: PathBuf,
    /// File to attach. Defaults to a small text placeholder.
    #[arg(short, long)]
    file: Option<PathBuf>,
    /// Content type of the attached file.
    #[arg(long, default_value = "application/octet-stream")]
    content_type: String,
    #[arg(long, action = ArgAction::SetTrue)]
    pretty: bool,
}

fn parse_header(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("entity-verify {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = Config::load().context("Failed to load configuration")?;
    apply_overrides(&mut config, &cli.global, &cli.command);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    let _logging_guard =
        logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    tracing::debug!(
        backend = %config.backend.url,
        api = %config.backend.api,
        lang = %config.backend.lang,
        "Configuration loaded"
    );

    let client = config
        .entity_client()
        .context("Failed to create entity client")?;

    match cli.command {
        Commands::Run { pretty, .. } => {
            let outcome = run_entity_scenario(&client, &config.scenario_options())
                .await
                .context("Entity scenario failed")?;
            if let ScenarioOutcome::Skipped { api } = &outcome {
                tracing::info!(api = %api, "Nothing to verify");
            }
            print_json(&outcome, pretty)?;
        }
        Commands::List { pretty } => {
            let entities = client.list_entities().await?;
            print_json(&entities, pretty)?;
        }
        Commands::Get { id, pretty } => {
            let entity = client.get_entity(&EntityId::from(id)).await?;
            print_json(&entity, pretty)?;
        }
        Commands::Create { payload } => {
            let body = read_body(&payload.body)?;
            let file = read_file_part(payload.file.as_deref(), &payload.content_type, false)?;
            let entity = client.create_entity(&body, &file).await?;
            print_json(&entity, payload.pretty)?;
        }
        Commands::Update { id, payload } => {
            let body = read_body(&payload.body)?;
            let file = read_file_part(payload.file.as_deref(), &payload.content_type, true)?;
            let entity = client
                .update_entity(&EntityId::from(id), &body, &file)
                .await?;
            print_json(&entity, payload.pretty)?;
        }
        Commands::Delete { id } => {
            client.delete_entity(&EntityId::from(id.clone())).await?;
            tracing::info!(id = %id, "Entity deleted");
        }
        Commands::File { name } => {
            download_file(&client, &name).await?;
        }
        Commands::Version => {}
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, global: &GlobalArgs, command: &Commands) {
    if let Some(url) = &global.url {
        config.backend.url = url.clone();
    }
    if let Some(api) = &global.api {
        config.backend.api = api.clone();
    }
    if let Some(lang) = &global.lang {
        config.backend.lang = lang.clone();
    }
    if let Some(token) = &global.token {
        config.auth.bearer_token = Some(token.clone());
    }
    for (name, value) in &global.headers {
        config.auth.headers.insert(name.clone(), value.clone());
    }
    if let Some(seconds) = global.write_timeout {
        config.http.write_timeout_seconds = seconds;
    }
    if global.json_logs {
        config.logging.json = true;
    }
    if let Commands::Run {
        no_verify_deleted,
        verify_file,
        ..
    } = command
    {
        if *no_verify_deleted {
            config.scenario.verify_deleted = false;
        }
        if *verify_file {
            config.scenario.verify_file = true;
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    if pretty {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", serde_json::to_string(value)?);
    }
    Ok(())
}

fn read_body(path: &Path) -> Result<Value> {
    let contents = if path.to_string_lossy() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read JSON record from stdin")?;
        buf
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read record file '{}'", path.display()))?
    };
    let value: Value = serde_json::from_str(&contents).context("Record is not valid JSON")?;
    if !value.is_object() {
        anyhow::bail!("Record must be a JSON object");
    }
    Ok(value)
}

fn read_file_part(path: Option<&Path>, content_type: &str, update: bool) -> Result<FilePart> {
    let Some(path) = path else {
        return Ok(if update {
            FilePart::update_placeholder()
        } else {
            FilePart::create_placeholder()
        });
    };
    let content =
        fs::read(path).with_context(|| format!("Failed to read file '{}'", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.bin".to_string());
    Ok(FilePart::new(file_name, content_type, content))
}

async fn download_file(client: &EntityClient, name: &str) -> Result<()> {
    let bytes = client.get_file(name).await?;
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&bytes)
        .context("Failed to write file to stdout")?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_parser_splits_on_first_colon() {
        assert_eq!(
            parse_header("Authorization: Bearer a:b").unwrap(),
            ("Authorization".to_string(), "Bearer a:b".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "entity-verify",
            "--url",
            "http://backend:8080",
            "-H",
            "X-Api-Key: k",
            "run",
            "--no-verify-deleted",
            "--verify-file",
        ])
        .unwrap();
        assert_eq!(cli.global.url.as_deref(), Some("http://backend:8080"));
        assert_eq!(
            cli.global.headers,
            vec![("X-Api-Key".to_string(), "k".to_string())]
        );
        assert!(matches!(
            cli.command,
            Commands::Run {
                no_verify_deleted: true,
                verify_file: true,
                pretty: false
            }
        ));
    }

    #[test]
    fn global_flags_are_accepted_after_subcommand() {
        let cli = Cli::try_parse_from(["entity-verify", "get", "42", "--api", "graphql"]).unwrap();
        assert_eq!(cli.global.api.as_deref(), Some("graphql"));
        assert!(matches!(cli.command, Commands::Get { ref id, .. } if id == "42"));
    }

    #[test]
    fn create_requires_body() {
        assert!(Cli::try_parse_from(["entity-verify", "create"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
