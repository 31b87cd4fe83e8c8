//! Chat service against the mock backend.
//!
//! Room resolution is one idempotent RPC; sending writes the message row
//! and touches the room's timestamp, never appending optimistically.

#![allow(clippy::unwrap_used)]

use serde_json::json;
use uuid::Uuid;

use pixelmart_core::ChatRoomId;
use pixelmart_integration_tests::{MockBackend, mock_realtime, test_user};
use pixelmart_realtime::RealtimeHub;
use pixelmart_storefront::services::chat::{ChatError, ChatService};

async fn hub() -> RealtimeHub {
    let url = mock_realtime().await;
    RealtimeHub::connect(&url, "test-key").await.unwrap()
}

fn seed_room(mock: &MockBackend, user_email: &str) -> Uuid {
    let room_id = Uuid::new_v4();
    mock.set_rpc(
        "get_or_create_chat_room",
        json!({
            "id": room_id,
            "user_id": Uuid::new_v4(),
            "user_email": user_email,
            "last_message_at": chrono::Utc::now().to_rfc3339(),
            "created_at": chrono::Utc::now().to_rfc3339(),
        }),
    );
    room_id
}

#[tokio::test]
async fn room_resolution_sends_the_user_id() {
    let mock = MockBackend::spawn().await;
    let user = test_user();
    seed_room(&mock, user.email.as_str());
    let client = mock.client();
    let realtime = hub().await;
    let service = ChatService::new(&client, &realtime);

    let room = service.resolve_room(&user).await.unwrap();

    assert_eq!(room.user_email.as_deref(), Some(user.email.as_str()));
    let rpc = mock
        .requests()
        .into_iter()
        .find(|r| r.path == "/rest/v1/rpc/get_or_create_chat_room")
        .unwrap();
    assert_eq!(rpc.body.unwrap()["user_id"], json!(user.id));
}

#[tokio::test]
async fn send_writes_the_row_and_touches_the_room() {
    let mock = MockBackend::spawn().await;
    let user = test_user();
    let room_id = ChatRoomId::new(seed_room(&mock, user.email.as_str()));
    let client = mock.client();
    let realtime = hub().await;
    let service = ChatService::new(&client, &realtime);

    let message = service
        .send(&user, room_id, "Is my order confirmed?", None)
        .await
        .unwrap();

    assert_eq!(message.content, "Is my order confirmed?");
    assert_eq!(mock.count("POST", "/rest/v1/chat_messages"), 1);
    assert_eq!(mock.count("PATCH", "/rest/v1/chat_rooms"), 1);
}

#[tokio::test]
async fn blank_message_without_attachment_writes_nothing() {
    let mock = MockBackend::spawn().await;
    let user = test_user();
    let room_id = ChatRoomId::new(seed_room(&mock, user.email.as_str()));
    let client = mock.client();
    let realtime = hub().await;
    let service = ChatService::new(&client, &realtime);

    let result = service.send(&user, room_id, "   ", None).await;

    assert!(matches!(result, Err(ChatError::EmptyMessage)));
    assert_eq!(mock.count("POST", "/rest/v1/chat_messages"), 0);
}

#[tokio::test]
async fn history_is_fetched_oldest_first_for_the_room_only() {
    let mock = MockBackend::spawn().await;
    let user = test_user();
    let room_id = ChatRoomId::new(seed_room(&mock, user.email.as_str()));
    let other_room = Uuid::new_v4();
    let early = chrono::Utc::now() - chrono::Duration::minutes(5);
    mock.seed(
        "chat_messages",
        vec![
            json!({
                "id": Uuid::new_v4(),
                "room_id": room_id,
                "sender_role": "customer",
                "content": "hello",
                "created_at": early.to_rfc3339(),
            }),
            json!({
                "id": Uuid::new_v4(),
                "room_id": other_room,
                "sender_role": "admin",
                "content": "wrong room",
                "created_at": chrono::Utc::now().to_rfc3339(),
            }),
        ],
    );
    let client = mock.client();
    let realtime = hub().await;
    let service = ChatService::new(&client, &realtime);

    let messages = service.history(&user, room_id).await.unwrap();

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "hello");

    let request = mock
        .requests()
        .into_iter()
        .find(|r| r.path == "/rest/v1/chat_messages")
        .unwrap();
    assert_eq!(request.query.get("order").unwrap(), "created_at.asc");
}
