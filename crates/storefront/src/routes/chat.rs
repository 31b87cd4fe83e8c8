//! Live chat route handlers.
//!
//! The chat page loads history, then listens on an SSE stream bridged
//! from the realtime subscription for the user's room. No message is
//! appended optimistically; the sent row comes back over the stream.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Multipart, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::Stream;
use serde::Deserialize;
use tracing::instrument;

use pixelmart_realtime::Subscription;

use crate::backend::types::{ChatMessage, ChatRoom};
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::services::chat::{ChatError, ChatService};
use crate::state::AppState;

/// Chat page template.
#[derive(Template, WebTemplate)]
#[template(path = "chat/show.html")]
pub struct ChatShowTemplate {
    pub room: ChatRoom,
    pub messages: Vec<ChatMessage>,
    pub logged_in: bool,
}

/// One rendered message bubble (SSE payload and send echo).
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

/// Display the chat page with history.
#[instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    let service = ChatService::new(state.backend(), state.realtime());
    let room = service.resolve_room(&user).await.map_err(chat_error)?;
    let messages = service.history(&user, room.id).await.map_err(chat_error)?;

    Ok(ChatShowTemplate {
        room,
        messages,
        logged_in: true,
    })
}

/// SSE stream of new messages in the user's room.
///
/// Dropping the connection drops the realtime subscription guard, which
/// releases the topic once the last listener leaves.
#[instrument(skip(state, user))]
pub async fn events(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>>, AppError> {
    let service = ChatService::new(state.backend(), state.realtime());
    let room = service.resolve_room(&user).await.map_err(chat_error)?;
    let subscription = service.subscribe(room.id);

    Ok(Sse::new(message_stream(subscription)).keep_alive(KeepAlive::default()))
}

/// Send a message. The reply is empty; the message arrives over SSE.
#[instrument(skip(state, user, form))]
pub async fn send(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<SendForm>,
) -> Result<Response, AppError> {
    let service = ChatService::new(state.backend(), state.realtime());
    let room = service.resolve_room(&user).await.map_err(chat_error)?;
    service
        .send(&user, room.id, &form.content, None)
        .await
        .map_err(chat_error)?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Upload an attachment and send it as a message.
#[instrument(skip(state, user, multipart))]
pub async fn upload(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let service = ChatService::new(state.backend(), state.realtime());
    let room = service.resolve_room(&user).await.map_err(chat_error)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("attachment") {
            continue;
        }
        let filename = field.file_name().unwrap_or("attachment").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let url = service
            .upload_attachment(&user, room.id, &filename, bytes.to_vec(), &content_type)
            .await
            .map_err(chat_error)?;
        service
            .send(&user, room.id, "", Some(url))
            .await
            .map_err(chat_error)?;

        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    Err(AppError::BadRequest("no attachment field".to_string()))
}

/// Bridge a realtime subscription into SSE events. Rows that fail to
/// parse as chat messages are skipped; a lagged or closed channel ends
/// the stream and the client reconnects.
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

fn chat_error(err: ChatError) -> AppError {
    match err {
        ChatError::EmptyMessage => AppError::BadRequest("message is empty".to_string()),
        ChatError::Backend(err) => AppError::Backend(err),
    }
}
