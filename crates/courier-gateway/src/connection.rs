use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use courier_db::{Database, StoreError};
use courier_types::events::{GatewayCommand, GatewayEvent};

use crate::registry::GroupRegistry;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a pre-authenticated WebSocket connection. The bearer token was
/// validated at the HTTP upgrade layer; `user_id` stays bound to this
/// connection for its lifetime.
pub async fn handle_connection(
    socket: WebSocket,
    registry: GroupRegistry,
    db: Arc<Database>,
    user_id: Uuid,
) {
    let (mut sender, mut receiver) = socket.split();

    let conn_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel::<GatewayEvent>();

    info!("{} connected to gateway as {}", user_id, conn_id);

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward queued events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("failed to serialize gateway event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let registry_recv = registry.clone();
    let tx_recv = tx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&registry_recv, &db, user_id, conn_id, &tx_recv, cmd).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            user_id,
                            e,
                            &text[..text.len().min(200)]
                        );
                        send_error(&tx_recv, "VALIDATION_ERROR", "unrecognized command");
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.leave_all(conn_id).await;
    info!("{} disconnected from gateway ({})", user_id, conn_id);
}

/// Dispatch one client command. Failures are logged and surfaced as a
/// client-visible error event; the connection stays open.
async fn handle_command(
    registry: &GroupRegistry,
    db: &Arc<Database>,
    user_id: Uuid,
    conn_id: Uuid,
    tx: &mpsc::UnboundedSender<GatewayEvent>,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::JoinConversation { conversation_id } => {
            // Membership is re-checked on every join; a connection cannot
            // subscribe to arbitrary groups by guessing ids.
            let check = {
                let db = db.clone();
                tokio::task::spawn_blocking(move || db.is_participant(conversation_id, user_id))
                    .await
            };
            match check {
                Ok(Ok(true)) => {
                    registry.join(conversation_id, conn_id, tx.clone()).await;
                    info!("{} joined conversation {}", user_id, conversation_id);
                }
                Ok(Ok(false)) => {
                    send_error(tx, "PERMISSION_DENIED", "not a participant");
                }
                Ok(Err(e)) => {
                    error!("join check failed for {}: {}", conversation_id, e);
                    send_error(tx, e.code(), "could not join conversation");
                }
                Err(e) => {
                    error!("spawn_blocking join error: {}", e);
                    send_error(tx, "INTERNAL", "could not join conversation");
                }
            }
        }

        GatewayCommand::LeaveConversation { conversation_id } => {
            registry.leave(conversation_id, conn_id).await;
        }

        GatewayCommand::SendMessage {
            conversation_id,
            content,
            message_type,
            files,
        } => {
            // Persist first; broadcast only a durably stored record.
            let persisted = {
                let db = db.clone();
                tokio::task::spawn_blocking(move || {
                    db.send_message(conversation_id, user_id, &content, message_type, &files)
                })
                .await
            };
            match persisted {
                Ok(Ok(message)) => {
                    let delivered = registry
                        .publish(conversation_id, &GatewayEvent::NewMessage { message })
                        .await;
                    info!(
                        "{} sent message to {} ({} subscribers)",
                        user_id, conversation_id, delivered
                    );
                }
                Ok(Err(e @ StoreError::PermissionDenied)) => {
                    send_error(tx, e.code(), "not a participant");
                }
                Ok(Err(e @ StoreError::Validation(_))) => {
                    let detail = e.to_string();
                    send_error(tx, e.code(), &detail);
                }
                Ok(Err(e)) => {
                    error!("send failed for {}: {}", conversation_id, e);
                    send_error(tx, e.code(), "could not send message");
                }
                Err(e) => {
                    error!("spawn_blocking send error: {}", e);
                    send_error(tx, "INTERNAL", "could not send message");
                }
            }
        }
    }
}

fn send_error(tx: &mpsc::UnboundedSender<GatewayEvent>, code: &str, message: &str) {
    let _ = tx.send(GatewayEvent::Error {
        code: code.to_string(),
        message: message.to_string(),
    });
}
