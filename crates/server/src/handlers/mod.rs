//! Transport adapters: the WebSocket gateway and the REST surface.
//!
//! The gateway owns the per-session channel. Inbound frames are parsed into
//! `ClientEvent`s and dispatched to the router; outbound events flow through
//! the session's mpsc sink into a writer task. Errors are structured `error`
//! events on the same channel and never close the connection; only the
//! transport-level disconnect ends a session.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppState;
use crate::error::ChatError;
use crate::models::{ConversationSummary, UserProfile};
use crate::protocol::{ClientEvent, ServerEvent};
use crate::registry::{EventSink, Session};

/// GET /ws
///
/// Upgrade to the persistent per-session channel.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session(socket, state))
}

async fn handle_session(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4().to_string();
    info!("session {} connected", session_id);

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (sink, mut events) = mpsc::unbounded_channel::<ServerEvent>();

    // Writer task: drains the session sink into the transport. Serialization
    // failures drop the event; transport failures end the pump.
    let writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    error!("failed to encode event: {}", e);
                    continue;
                }
            };
            if ws_tx.send(WsMessage::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = ws_rx.next().await {
        match frame {
            WsMessage::Text(text) => dispatch(&state, &session_id, &sink, text.as_str()).await,
            WsMessage::Close(_) => break,
            // Ping/pong handled by axum; binary frames are not part of the protocol.
            _ => {}
        }
    }

    // Transport gone: clean up and, when this was the participant's last
    // session, publish the offline transition.
    if let Some(removed) = state.registry.unregister(&session_id).await {
        if removed.participant_offline {
            state.presence.user_offline(&removed.session).await;
        }
    }
    writer.abort();
    info!("session {} disconnected", session_id);
}

async fn dispatch(state: &AppState, session_id: &str, sink: &EventSink, text: &str) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!("session {} sent malformed frame: {}", session_id, e);
            send_error_message(sink, "Invalid event");
            return;
        }
    };

    match event {
        ClientEvent::Register {
            user_id,
            user_name,
            role,
        } => {
            let session = Session {
                session_id: session_id.to_string(),
                participant_id: user_id.clone(),
                display_name: user_name.unwrap_or_else(|| user_id.clone()),
                role,
            };
            let displaced = state
                .registry
                .register(session.clone(), sink.clone())
                .await;
            // Re-binding this session id may have taken another participant's
            // last session with it.
            if let Some(displaced) = displaced {
                if displaced.participant_offline
                    && displaced.session.participant_id != session.participant_id
                {
                    state.presence.user_offline(&displaced.session).await;
                }
            }
            state.presence.user_online(&session).await;
        }

        ClientEvent::StartConversation { target_user_id } => {
            if let Err(e) = state
                .router
                .start_conversation(session_id, &target_user_id)
                .await
            {
                send_error(sink, &e);
            }
        }

        ClientEvent::SendMessage {
            room_id,
            content,
            receiver_id,
            message_type,
        } => {
            if let Err(e) = state
                .router
                .send_message(session_id, &room_id, &content, &receiver_id, message_type)
                .await
            {
                send_error(sink, &e);
            }
        }

        ClientEvent::MarkAsRead {
            room_id,
            message_ids,
        } => {
            if let Err(e) = state.router.mark_as_read(&room_id, message_ids).await {
                send_error(sink, &e);
            }
        }

        ClientEvent::Typing { room_id, is_typing } => {
            state.router.typing(session_id, &room_id, is_typing).await;
        }

        ClientEvent::GetOnlineUsers => {
            let users = state.presence.online_users().await;
            let _ = sink.send(ServerEvent::OnlineUsers(users));
        }
    }
}

fn send_error(sink: &EventSink, error: &ChatError) {
    send_error_message(sink, error.user_message());
}

fn send_error_message(sink: &EventSink, message: &str) {
    let _ = sink.send(ServerEvent::Error {
        message: message.to_string(),
    });
}

/// GET /chat/users
///
/// Active directory profiles for the conversation-partner picker.
pub async fn list_chat_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserProfile>>, StatusCode> {
    state.directory.list_active().await.map(Json).map_err(|e| {
        error!("failed to list users: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// GET /chat/conversations/{user_id}
///
/// Conversation summaries for one participant, newest activity first.
pub async fn get_user_conversations(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ConversationSummary>>, StatusCode> {
    state
        .aggregator
        .conversations_for(&user_id)
        .await
        .map(Json)
        .map_err(|e| {
            error!("failed to aggregate conversations for {}: {}", user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// GET /chat/unread/{user_id}
///
/// Total unread count across conversations.
pub async fn get_unread_count(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let count = state.aggregator.unread_total(&user_id).await.map_err(|e| {
        error!("failed to count unread for {}: {}", user_id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(json!({ "unreadCount": count })))
}

pub async fn health_check() -> &'static str {
    "OK - CareLink Messaging Server"
}
