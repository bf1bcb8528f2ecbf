//! End-to-end flows against an in-process axum WebSocket server, connected
//! through the real tokio-tungstenite connector.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::Path;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use jobtrack_client::{
    ClientConfig, OnboardingHandle, OnboardingSnapshot, ReasoningClient, ReasoningUpdate,
    ResumeFile, Step, WsConnector,
};
use serde_json::{json, Value};

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/api/ost/ws/onboarding/{session_id}", get(onboarding_ws))
        .route("/reasoning/ws/reasoning", get(reasoning_ws));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        api_base_url: format!("http://{addr}"),
        ..Default::default()
    }
}

async fn send_json(socket: &mut WebSocket, value: Value) {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

async fn next_json(socket: &mut WebSocket) -> Option<Value> {
    while let Some(Ok(message)) = socket.next().await {
        match message {
            Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
    None
}

async fn onboarding_ws(ws: WebSocketUpgrade, Path(session_id): Path<String>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| onboarding_script(socket, session_id))
}

/// Resume in, one question, one answer, profile out.
async fn onboarding_script(mut socket: WebSocket, session_id: String) {
    let Some(upload) = next_json(&mut socket).await else {
        return;
    };
    assert_eq!(upload["type"], "start_with_resume");
    assert_eq!(upload["file_name"], "resume.pdf");

    socket
        .send(Message::Text("definitely not json".into()))
        .await
        .unwrap();
    send_json(&mut socket, json!({"type": "status", "message": "Parsing resume"})).await;
    send_json(&mut socket, json!({"type": "heartbeat"})).await;
    send_json(
        &mut socket,
        json!({
            "type": "analysis_complete",
            "job_field": "Data Science",
            "questions": [{"variable": "min_salary", "question": "Minimum salary?"}]
        }),
    )
    .await;
    send_json(
        &mut socket,
        json!({"type": "next_question", "variable": "min_salary", "question_text": "Minimum salary?"}),
    )
    .await;

    let Some(answer) = next_json(&mut socket).await else {
        return;
    };
    assert_eq!(answer["type"], "answer");
    assert_eq!(answer["variable"], "min_salary");

    send_json(
        &mut socket,
        json!({
            "type": "interpretation_result",
            "variable": "min_salary",
            "interpreted_value": 120000,
            "confidence": 0.92,
            "reasoning": "said 120k"
        }),
    )
    .await;
    send_json(
        &mut socket,
        json!({
            "type": "profile_created",
            "profile": {
                "user_id": session_id,
                "job_field": "Data Science",
                "preferences": {"min_salary": 120000}
            }
        }),
    )
    .await;

    // Client hangs up after the profile.
    assert!(next_json(&mut socket).await.is_none());
}

async fn reasoning_ws(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(reasoning_script)
}

async fn reasoning_script(mut socket: WebSocket) {
    send_json(&mut socket, json!({"type": "session_created", "session_id": "rs-1"})).await;

    while let Some(message) = next_json(&mut socket).await {
        match message["type"].as_str() {
            Some("query") => {
                send_json(&mut socket, json!({"type": "processing", "message": "Thinking"})).await;
                send_json(
                    &mut socket,
                    json!({
                        "type": "reasoning_step",
                        "step": {
                            "iteration": 1,
                            "thought": "look up salary bands",
                            "action": {"name": "search", "input": message["query"]},
                            "observation": "bands found",
                            "is_final": false
                        }
                    }),
                )
                .await;
                send_json(
                    &mut socket,
                    json!({
                        "type": "reasoning_complete",
                        "result": {"answer": "Yes.", "iterations": 1, "stopping_reason": "answer"}
                    }),
                )
                .await;
            }
            Some("close") => {
                send_json(&mut socket, json!({"type": "session_closed", "session_id": "rs-1"}))
                    .await;
                break;
            }
            _ => {}
        }
    }
}

async fn wait_for<F>(handle: &OnboardingHandle, predicate: F) -> Arc<OnboardingSnapshot>
where
    F: Fn(&OnboardingSnapshot) -> bool,
{
    let mut revisions = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let snapshot = handle.state().await.unwrap();
            if predicate(&snapshot) {
                return snapshot;
            }
            revisions.changed().await.unwrap();
        }
    })
    .await
    .expect("flow did not reach the expected state")
}

#[tokio::test]
async fn onboarding_over_real_websocket() {
    let addr = spawn_server().await;
    let handle = OnboardingHandle::start(Arc::new(WsConnector), config(addr));

    handle.open_modal().await;
    handle
        .set_resume_file(ResumeFile::from_name_and_bytes(
            "resume.pdf",
            b"%PDF-1.7 test".to_vec(),
        ))
        .await;

    let snapshot = wait_for(&handle, |s| s.state.is_awaiting_answer).await;
    assert_eq!(snapshot.state.step, Step::Questioning);
    assert_eq!(snapshot.state.job_field.as_deref(), Some("Data Science"));
    let session_id = snapshot.state.session_id.clone().unwrap();

    handle.submit_answer("at least 120k").await;

    let snapshot = wait_for(&handle, |s| s.state.step.is_terminal()).await;
    assert_eq!(snapshot.state.step, Step::Completed);
    let profile = snapshot.state.created_profile.as_ref().unwrap();
    assert_eq!(profile.user_id, Some(json!(session_id)));

    let texts: Vec<&str> = snapshot
        .state
        .transcript
        .messages()
        .iter()
        .map(|m| m.text.as_str())
        .collect();
    assert!(texts.contains(&"I understood your answer as: $120,000\nReasoning: said 120k"));
    assert_eq!(*texts.last().unwrap(), "Preferences saved:\nmin_salary: 120000");
}

#[tokio::test]
async fn reasoning_session_over_real_websocket() {
    let addr = spawn_server().await;
    let (client, mut updates) = ReasoningClient::spawn(Arc::new(WsConnector), &config(addr));

    assert_eq!(client.connect().await.unwrap(), "rs-1");
    client
        .send_query("Is 120k realistic?", "job search")
        .await
        .unwrap();

    let mut answer = None;
    while let Some(update) = updates.recv().await {
        if let ReasoningUpdate::Complete(result) = update {
            answer = Some(result.answer);
            break;
        }
    }
    assert_eq!(answer.as_deref(), Some("Yes."));

    client.close().await;
    assert!(!client.is_connected());
    assert!(client.send_query("again?", "job search").await.is_err());
}
