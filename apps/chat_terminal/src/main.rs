use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use session_core::{load_settings, BackendKind, SessionController, SessionSnapshot, TurnOutcome};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
    task::JoinSet,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod render;

use render::TranscriptView;

#[derive(Parser, Debug)]
struct Args {
    /// Settings file; `chat.toml` in the working directory is used when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// `full_history` or `chat_proxy`; overrides settings and environment.
    #[arg(long)]
    backend: Option<String>,
    /// Print the transcript as JSON on exit.
    #[arg(long)]
    dump_transcript: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(raw) = &args.backend {
        settings.backend = raw.parse::<BackendKind>()?;
    }

    let controller = SessionController::from_settings(&settings);
    info!(backend = controller.backend_name(), "chat session started");
    println!("Type a message and press enter; /quit exits.");
    println!("Text entered while a reply is pending is kept; press enter on an empty line to send it.");

    let renderer = tokio::spawn(render_loop(controller.subscribe()));

    // Turns run off the input loop so typing continues while one is in flight.
    let mut turns = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match classify_line(&line) {
            LineAction::Quit => break,
            LineAction::Submit { replace_input } => {
                if let Some(text) = replace_input {
                    controller.update_input(text).await;
                }
            }
        }
        let controller = controller.clone();
        turns.spawn(async move {
            if controller.submit_turn().await == TurnOutcome::Rejected {
                println!("(still waiting for the previous reply; your text is kept)");
            }
        });
        while turns.try_join_next().is_some() {}
    }

    while turns.join_next().await.is_some() {}
    let snapshot = controller.snapshot().await;
    drop(controller);
    renderer.await?;

    if args.dump_transcript {
        println!("{}", serde_json::to_string_pretty(&snapshot.transcript)?);
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum LineAction {
    Quit,
    /// Submit the pending input, first replacing it when the line has text.
    /// An empty line sends whatever is already pending.
    Submit { replace_input: Option<String> },
}

fn classify_line(line: &str) -> LineAction {
    match line.trim() {
        "/quit" => LineAction::Quit,
        "" => LineAction::Submit {
            replace_input: None,
        },
        _ => LineAction::Submit {
            replace_input: Some(line.to_string()),
        },
    }
}

async fn render_loop(mut rx: broadcast::Receiver<SessionSnapshot>) {
    let mut view = TranscriptView::default();
    loop {
        match rx.recv().await {
            Ok(snapshot) => {
                for line in view.apply(&snapshot) {
                    println!("{line}");
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "renderer fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}
