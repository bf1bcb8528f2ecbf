//! `jobtrack ask <query>`: one reasoning query without onboarding.

use std::sync::Arc;

use anyhow::{bail, Context};
use jobtrack_client::{
    ClientConfig, ReasoningClient, ReasoningState, ReasoningUpdate, Transcript, WsConnector,
};
use tracing::info;

use crate::output::TranscriptPrinter;

pub async fn run(config: ClientConfig, query: String) -> anyhow::Result<()> {
    let (client, mut updates) = ReasoningClient::spawn(Arc::new(WsConnector), &config);
    let session_id = client
        .connect()
        .await
        .context("Failed to connect to reasoning service")?;
    info!(
        component = "cli",
        event = "cli.ask.connected",
        reasoning_session_id = %session_id,
        "Reasoning session ready"
    );

    let mut transcript = Transcript::new();
    let mut state = ReasoningState::default();
    let mut printer = TranscriptPrinter::default();

    state.begin();
    state.query_sent(&mut transcript, &query, &now());
    printer.print_new(&transcript);
    client.send_query(&query, &config.reasoning_context).await?;

    while let Some(update) = updates.recv().await {
        let closed = matches!(update, ReasoningUpdate::Closed);
        state.apply(update, &mut transcript, &now());
        printer.print_new(&transcript);

        if state.result.is_some() {
            client.close().await;
            return Ok(());
        }
        if let Some(error) = &state.error {
            client.close().await;
            bail!("Reasoning failed: {error}");
        }
        if closed {
            bail!("Reasoning connection closed before an answer arrived");
        }
    }

    bail!("Reasoning client stopped")
}

fn now() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}Z", secs)
}
