//! Chat console: every customer room, live in one place.
//!
//! The room list refreshes over SSE when a new room appears; opening a
//! room starts a second, room-scoped SSE stream for its messages. Events
//! for other rooms never reach an open room's stream because the
//! subscription topic carries the room-id filter.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::Stream;
use serde::Deserialize;
use tracing::instrument;

use pixelmart_core::{ChatRoomId, SenderRole};
use pixelmart_realtime::{Subscription, Topic};

use crate::backend::ServiceClient;
use crate::backend::types::{ChatMessage, ChatRoom, NewChatMessage};
use crate::error::AdminError;
use crate::filters;
use crate::state::AppState;

/// Chat console page template.
#[derive(Template, WebTemplate)]
#[template(path = "chat/index.html")]
pub struct ChatIndexTemplate {
    pub rooms: Vec<ChatRoom>,
}

/// One selected room with its history.
#[derive(Template, WebTemplate)]
#[template(path = "chat/room.html")]
pub struct ChatRoomTemplate {
    pub room: ChatRoom,
    pub messages: Vec<ChatMessage>,
}

/// The room list fragment (re-rendered when a room appears).
#[derive(Template, WebTemplate)]
#[template(path = "partials/room_list.html")]
pub struct RoomListTemplate {
    pub rooms: Vec<ChatRoom>,
}

/// One rendered message bubble (SSE payload).
#[derive(Template, WebTemplate)]
#[template(path = "partials/chat_message.html")]
pub struct ChatMessageTemplate {
    pub message: ChatMessage,
}

/// Message send form data.
#[derive(Debug, Deserialize)]
pub struct SendForm {
    pub content: String,
}

async fn fetch_rooms(backend: &ServiceClient) -> Result<Vec<ChatRoom>, AdminError> {
    let rooms: Vec<ChatRoom> = backend
        .from("chat_rooms")
        .order("last_message_at.desc")
        .fetch()
        .await?;
    Ok(rooms)
}

/// The console page: all rooms, most recently active first.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<impl IntoResponse, AdminError> {
    let rooms = fetch_rooms(state.backend()).await?;
    Ok(ChatIndexTemplate { rooms })
}

/// SSE stream that re-renders the room list whenever a new room is
/// created.
#[instrument(skip(state))]
pub async fn room_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let subscription = state.realtime().subscribe(&Topic::table("chat_rooms"));
    let backend = state.backend().clone();

    let stream = futures_util::stream::unfold(
        (subscription, backend),
        |(mut subscription, backend)| async move {
            loop {
                match subscription.recv().await {
                    Ok(_event) => {
                        let Ok(rooms) = fetch_rooms(&backend).await else {
                            continue;
                        };
                        let Ok(html) = (RoomListTemplate { rooms }).render() else {
                            continue;
                        };
                        let event = Event::default().event("rooms").data(html);
                        return Some((Ok(event), (subscription, backend)));
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "room list stream ended");
                        return None;
                    }
                }
            }
        },
    );

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// One room: history plus the send form.
#[instrument(skip(state))]
pub async fn room(
    State(state): State<AppState>,
    Path(room_id): Path<ChatRoomId>,
) -> Result<impl IntoResponse, AdminError> {
    let room: ChatRoom = state
        .backend()
        .from("chat_rooms")
        .eq("id", room_id)
        .fetch_one()
        .await?;
    let messages: Vec<ChatMessage> = state
        .backend()
        .from("chat_messages")
        .eq("room_id", room_id)
        .order("created_at.asc")
        .fetch()
        .await?;

    Ok(ChatRoomTemplate { room, messages })
}

/// SSE stream of new messages in one room.
///
/// Dropping the connection drops the subscription guard, which releases
/// the topic once the last listener leaves.
#[instrument(skip(state))]
pub async fn message_events(
    State(state): State<AppState>,
    Path(room_id): Path<ChatRoomId>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let topic = Topic::filtered("chat_messages", "room_id", room_id);
    let subscription = state.realtime().subscribe(&topic);

    Sse::new(message_stream(subscription)).keep_alive(KeepAlive::default())
}

/// Send a reply as the admin. The reply body is empty; the message
/// arrives back over SSE.
#[instrument(skip(state, form))]
pub async fn send(
    State(state): State<AppState>,
    Path(room_id): Path<ChatRoomId>,
    Form(form): Form<SendForm>,
) -> Result<Response, AdminError> {
    let content = form.content.trim();
    if content.is_empty() {
        return Err(AdminError::BadRequest("message is empty".to_string()));
    }

    let _row: ChatMessage = state
        .backend()
        .insert_one(
            "chat_messages",
            &NewChatMessage {
                room_id,
                sender_role: SenderRole::Admin,
                content: content.to_string(),
            },
        )
        .await?;

    state
        .backend()
        .update(
            "chat_rooms",
            &[("id", room_id.to_string())],
            &serde_json::json!({ "last_message_at": chrono::Utc::now() }),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Bridge a room-scoped realtime subscription into SSE events.
fn message_stream(
    subscription: Subscription,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    futures_util::stream::unfold(subscription, |mut subscription| async move {
        loop {
            match subscription.recv().await {
                Ok(event) => {
                    let Ok(message) = serde_json::from_value::<ChatMessage>(event.record) else {
                        tracing::warn!("unparseable chat row on realtime channel");
                        continue;
                    };
                    let Ok(html) = (ChatMessageTemplate { message }).render() else {
                        continue;
                    };
                    let event = Event::default().event("message").data(html);
                    return Some((Ok(event), subscription));
                }
                Err(err) => {
                    tracing::debug!(error = %err, "chat stream ended");
                    return None;
                }
            }
        }
    })
}
