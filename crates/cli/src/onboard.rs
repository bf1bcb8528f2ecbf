//! `jobtrack onboard <resume>`: run one onboarding conversation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use console::style;
use jobtrack_client::{ClientConfig, OnboardingHandle, Step, WsConnector};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

use crate::output::{prompt, TranscriptPrinter};

/// Answers are typed at the prompt; a leading `?` asks the reasoning
/// service instead.
pub async fn run(config: ClientConfig, resume: PathBuf, json: bool) -> anyhow::Result<()> {
    let handle = OnboardingHandle::start(Arc::new(WsConnector), config);
    handle.open_modal().await;
    handle.set_resume_path(&resume).await;

    info!(
        component = "cli",
        event = "cli.onboard.started",
        resume = %resume.display(),
        "Onboarding started"
    );

    let mut lines = spawn_stdin_reader();
    let mut revisions = handle.subscribe();
    let mut printer = TranscriptPrinter::default();
    let mut prompted_revision = None;

    loop {
        let snapshot = handle.snapshot();
        printer.print_new(&snapshot.state.transcript);

        match snapshot.state.step {
            Step::Completed => {
                if json {
                    if let Some(profile) = &snapshot.state.created_profile {
                        println!("{}", serde_json::to_string_pretty(profile)?);
                    }
                }
                handle.close_modal().await;
                return Ok(());
            }
            Step::Error => {
                let message = snapshot
                    .state
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string());
                handle.close_modal().await;
                return Err(anyhow!("Onboarding failed: {message}"));
            }
            _ => {}
        }

        if snapshot.state.is_awaiting_answer && prompted_revision != Some(snapshot.revision) {
            prompt();
            prompted_revision = Some(snapshot.revision);
        }

        tokio::select! {
            changed = revisions.changed() => {
                if changed.is_err() {
                    bail!("Onboarding session ended unexpectedly");
                }
            }
            Some(line) = lines.recv() => {
                let line = line.trim();
                if let Some(query) = line.strip_prefix('?') {
                    let query = query.trim();
                    if !query.is_empty() {
                        handle.start_reasoning(query).await;
                    }
                } else if !line.is_empty() {
                    handle.submit_answer(line).await;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                handle.close_modal().await;
                eprintln!("{}", style("Interrupted").yellow());
                bail!("Onboarding interrupted");
            }
        }
    }
}

/// Forward stdin lines until EOF.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut reader = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
    rx
}
