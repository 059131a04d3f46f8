//! Colloquy command-line client.
//!
//! `colloquy init` registers a conversation with the study backend and
//! prints its greeting. `colloquy replay <frames.jsonl>` feeds a recorded
//! event channel through the transcript reducer and uploads the finalized
//! utterances (or only logs them with `--dry-run`).

mod config;
mod replay;

use colloquy_voice::{BackendClient, UtteranceSink};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: colloquy [--config <path>] <init | replay <frames.jsonl> [--dry-run]>";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Init,
    Replay { path: String, dry_run: bool },
}

#[derive(Debug, PartialEq, Eq)]
struct Invocation {
    config_path: Option<String>,
    command: Command,
}

fn parse_args(args: &[String]) -> Option<Invocation> {
    let mut config_path = None;
    let mut dry_run = false;
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config_path = Some(iter.next()?.clone()),
            "--dry-run" => dry_run = true,
            _ => positional.push(arg.as_str()),
        }
    }

    let command = match positional.as_slice() {
        ["init"] => Command::Init,
        ["replay", path] => Command::Replay {
            path: (*path).to_string(),
            dry_run,
        },
        _ => return None,
    };
    Some(Invocation {
        config_path,
        command,
    })
}

fn resolve_config_path(from_args: Option<String>) -> (Option<String>, &'static str) {
    if let Some(path) = from_args.filter(|value| !value.trim().is_empty()) {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("COLLOQUY_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(invocation) = parse_args(&args) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let (resolved_config_path, config_source) = resolve_config_path(invocation.config_path);
    let selected_config_path = resolved_config_path.as_deref().or(Some("colloquy.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration, the client cannot start without valid config");

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let backend = match BackendClient::new(config.voice.clone()) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!(error = %e, "failed to build backend client");
            std::process::exit(1);
        }
    };
    let context = config.conversation.to_context();

    match invocation.command {
        Command::Init => match backend.initialize_conversation(&context).await {
            Ok(reply) => {
                tracing::info!(conversation_id = %context.conversation_id, "conversation initialized");
                println!("conversation_id: {}", context.conversation_id);
                if let Some(greeting) = reply.initial_utterance {
                    println!("{greeting}");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to initialize conversation");
                std::process::exit(1);
            }
        },
        Command::Replay { path, dry_run } => {
            let input = match std::fs::read_to_string(&path) {
                Ok(input) => input,
                Err(e) => {
                    tracing::error!(path = %path, error = %e, "failed to read recording");
                    std::process::exit(1);
                }
            };

            let sink: Arc<dyn UtteranceSink> = if dry_run {
                Arc::new(replay::LogSink)
            } else {
                Arc::new(backend)
            };

            let report = replay::replay(&input, context, None, sink).await;
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode replay report");
                    std::process::exit(1);
                }
            }
            if report.persisted.failed > 0 {
                tracing::warn!(failed = report.persisted.failed, "some utterances were not saved");
            }
        }
    }
}
