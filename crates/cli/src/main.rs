mod command;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use command::{CommandAction, CommandRequest, CommandResponse};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "context-ingest")]
#[command(about = "Incrementally ingest a document tree into a vector store", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: <project>/.context-ingest/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the full JSON response instead of a summary line
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the store in line with a directory or file
    Ingest {
        source: PathBuf,

        /// Re-process every file regardless of recorded hashes
        #[arg(long)]
        force: bool,

        /// Skip project-level artifact generation
        #[arg(long)]
        skip_artifacts: bool,

        /// Ingest state file (default: <project>/.context-ingest/ingest.json)
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Show what `ingest` would do without touching anything
    Plan {
        source: PathBuf,

        #[arg(long)]
        force: bool,

        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Summarize the recorded ingest state
    Status {
        #[arg(default_value = ".")]
        project: PathBuf,

        #[arg(long)]
        state: Option<PathBuf>,
    },
}

impl Commands {
    fn into_request(self, config: Option<PathBuf>) -> CommandRequest {
        let (action, payload) = match self {
            Self::Ingest {
                source,
                force,
                skip_artifacts,
                state,
            } => (
                CommandAction::Ingest,
                json!({
                    "source": source,
                    "force": force,
                    "skip_artifacts": skip_artifacts,
                    "state_path": state,
                }),
            ),
            Self::Plan {
                source,
                force,
                state,
            } => (
                CommandAction::Plan,
                json!({ "source": source, "force": force, "state_path": state }),
            ),
            Self::Status { project, state } => (
                CommandAction::Status,
                json!({ "project": project, "state_path": state }),
            ),
        };
        CommandRequest {
            action,
            payload,
            config,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, finishing in-flight files");
            let _ = cancel_tx.send(true);
        }
    });

    let json_output = cli.json;
    let request = cli.command.into_request(cli.config);
    let action = request.action;
    let response = match command::execute(request, Some(cancel_rx)).await {
        Ok(response) => response,
        Err(err) => CommandResponse::error(format!("{err:#}")),
    };

    match render(action, &response, json_output) {
        Ok(()) if response.is_error() => ExitCode::FAILURE,
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Failed to render response: {err}");
            ExitCode::FAILURE
        }
    }
}

fn render(action: CommandAction, response: &CommandResponse, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    if let Some(message) = &response.message {
        eprintln!("Error: {message}");
    }
    for hint in &response.hints {
        eprintln!("hint: {}", hint.text);
    }
    if response.is_error() {
        return Ok(());
    }

    let data = &response.data;
    match action {
        CommandAction::Ingest => println!(
            "scanned {}, ingested {}, skipped {}, marked_deleted {}, errors {}",
            count(&data["summary"]["scanned"]),
            count(&data["summary"]["ingested"]),
            count(&data["summary"]["skipped"]),
            count(&data["summary"]["marked_deleted"]),
            count(&data["summary"]["errors"]),
        ),
        CommandAction::Plan => {
            let diff = &data["plan"]["diff"];
            for (marker, key) in [("+", "to_ingest"), ("-", "to_mark_deleted")] {
                for entry in diff[key].as_array().into_iter().flatten() {
                    // Candidates are objects; deletions are bare paths.
                    let path = entry["path"].as_str().or_else(|| entry.as_str());
                    println!("{marker} {}", path.unwrap_or("-"));
                }
            }
            println!(
                "to_ingest {}, to_skip {}, to_mark_deleted {}",
                count(&data["to_ingest"]),
                count(&data["to_skip"]),
                count(&data["to_mark_deleted"]),
            );
        }
        CommandAction::Status => {
            println!("project {}", data["stats"]["project_id"].as_str().unwrap_or("-"));
            println!("embedding {}", data["stats"]["embedding_id"].as_str().unwrap_or("-"));
            if let Some(roots) = data["stats"]["roots"].as_array() {
                for root in roots {
                    println!(
                        "{}: active {}, deleted {}",
                        root["root"].as_str().unwrap_or("-"),
                        count(&root["active"]),
                        count(&root["deleted"]),
                    );
                }
            }
            println!("total_active {}", count(&data["total_active"]));
        }
    }
    Ok(())
}

fn count(value: &Value) -> u64 {
    value.as_u64().unwrap_or(0)
}
