use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use contribution_chase::constants::{DEMO_COLS, DEMO_ROWS};
use contribution_chase::error::SimError;
use contribution_chase::grid::{demo_counts, validate_counts};
use contribution_chase::rng::Rng;
use contribution_chase::run::{self, OutputMode, RunCallbacks, RunConfig, RunHandle, RunOutput};
use contribution_chase::server_protocol::{parse_client_message, ParsedClientMessage};
use contribution_chase::server_utils::{normalize_game_speed, normalize_seed, normalize_tick_ms};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SimulateRequest {
    counts: Option<Vec<Vec<u32>>>,
    config: Option<RunConfig>,
}

/// Per-socket state. At most one interactive run is attached.
struct ClientContext {
    id: String,
    tx: mpsc::Sender<String>,
    run: Option<RunHandle>,
}

#[tokio::main]
async fn main() {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/simulate", post(simulate_handler))
        .route("/ws", get(ws_handler));

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            eprintln!("[server] failed to bind {bind_addr}: {error}");
            std::process::exit(2);
        }
    };

    println!("[server] listening on :{port}");
    if let Err(error) = axum::serve(listener, app).await {
        eprintln!("[server] runtime failed: {error}");
        std::process::exit(1);
    }
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn simulate_handler(body: String) -> Response {
    let request = if body.trim().is_empty() {
        SimulateRequest::default()
    } else {
        match serde_json::from_str::<SimulateRequest>(&body) {
            Ok(request) => request,
            Err(error) => return bad_request(format!("invalid request body: {error}")),
        }
    };

    let result = tokio::task::spawn_blocking(move || run_batch(request)).await;
    match result {
        Ok(Ok(output)) => Json(json!({
            "summary": output.summary,
            "history": output.history,
        }))
        .into_response(),
        Ok(Err(error)) => bad_request(error.to_string()),
        Err(error) => {
            eprintln!("[server] batch run panicked: {error}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "simulation failed" })),
            )
                .into_response()
        }
    }
}

fn run_batch(request: SimulateRequest) -> Result<RunOutput, SimError> {
    let mut config = request.config.unwrap_or_default();
    config.output_mode = OutputMode::Batch;
    let counts = match request.counts {
        Some(counts) => counts,
        None => demo_counts(DEMO_ROWS, DEMO_COLS, &mut Rng::new(config.seed)),
    };
    let handle = run::start(&counts, config, RunCallbacks::new())?;
    handle.output().cloned().ok_or_else(|| {
        SimError::UnsupportedConfiguration("batch run produced no output".to_string())
    })
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

async fn ws_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(handle_socket)
}

async fn handle_socket(socket: WebSocket) {
    let (tx, mut rx) = mpsc::channel::<String>(256);
    let mut client = ClientContext {
        id: make_id("client"),
        tx,
        run: None,
    };
    println!("[server] {} connected", client.id);

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(&mut client, raw.as_str()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = String::from_utf8(raw.to_vec()) {
                    handle_client_message(&mut client, &text).await;
                } else {
                    send_error(&client, "invalid utf8 message").await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    if let Some(handle) = client.run.take() {
        handle.stop();
    }
    println!("[server] {} disconnected", client.id);
    drop(client);
    let _ = writer.await;
}

async fn handle_client_message(client: &mut ClientContext, raw: &str) {
    let Some(message) = parse_client_message(raw) else {
        send_error(client, "invalid message").await;
        return;
    };

    match message {
        ParsedClientMessage::Start {
            seed,
            game_speed,
            tick_ms,
            counts,
        } => {
            if let Some(previous) = client.run.take() {
                previous.stop();
            }
            let config = RunConfig {
                output_mode: OutputMode::Interactive,
                tick_ms: normalize_tick_ms(tick_ms),
                game_speed: normalize_game_speed(game_speed),
                seed: normalize_seed(seed),
                ..RunConfig::default()
            };
            let counts = match counts {
                Some(counts) => counts,
                None => demo_counts(DEMO_ROWS, DEMO_COLS, &mut Rng::new(config.seed)),
            };
            if let Err(error) = validate_counts(&counts) {
                send_error(client, &error.to_string()).await;
                return;
            }
            println!(
                "[server] {} started run seed={} speed={} tickMs={}",
                client.id, config.seed, config.game_speed, config.tick_ms
            );
            match run::start(
                &counts,
                config,
                stream_callbacks(client.id.clone(), client.tx.clone()),
            ) {
                Ok(handle) => client.run = Some(handle),
                Err(error) => send_error(client, &error.to_string()).await,
            }
        }
        ParsedClientMessage::Stop => {
            let Some(handle) = client.run.take() else {
                return;
            };
            handle.stop();
            let tx = client.tx.clone();
            let client_id = client.id.clone();
            tokio::spawn(async move {
                match handle.join().await {
                    Ok(output) => {
                        let _ = tx
                            .send(json!({ "type": "game_over", "summary": output.summary }).to_string())
                            .await;
                    }
                    Err(error) => eprintln!("[server] {client_id} run ended abnormally: {error}"),
                }
            });
        }
        ParsedClientMessage::Ping { t } => {
            send_json(client, &json!({ "type": "pong", "t": t })).await;
        }
    }
}

/// Frames are dropped when the socket falls behind; completion is not.
fn stream_callbacks(client_id: String, tx: mpsc::Sender<String>) -> RunCallbacks {
    let frame_tx = tx.clone();
    let mut dropped: u64 = 0;
    RunCallbacks::new()
        .on_frame(move |frame| {
            let payload = json!({ "type": "frame", "frame": frame }).to_string();
            if let Err(mpsc::error::TrySendError::Full(_)) = frame_tx.try_send(payload) {
                dropped += 1;
                if should_report_drop(dropped) {
                    eprintln!(
                        "[server] {client_id} is behind, dropped frame tick={} (dropped={dropped})",
                        frame.tick
                    );
                }
            }
        })
        .on_complete(move |summary| {
            let payload = json!({ "type": "game_over", "summary": summary }).to_string();
            tokio::spawn(async move {
                let _ = tx.send(payload).await;
            });
        })
}

/// First drop and every hundredth after it.
fn should_report_drop(dropped: u64) -> bool {
    dropped == 1 || dropped.is_multiple_of(100)
}

async fn send_json(client: &ClientContext, message: &Value) {
    let _ = client.tx.send(message.to_string()).await;
}

async fn send_error(client: &ClientContext, message: &str) {
    send_json(client, &json!({ "type": "error", "message": message })).await;
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}
