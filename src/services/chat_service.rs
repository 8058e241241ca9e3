//! Chat Service
//!
//! One chat per client/host pair, optionally tied to a booking. Sending a
//! message also refreshes the chat summary in the same batch, so listings
//! never show a stale last message.

use crate::db::sqlite::models::{Chat, Message};
use crate::error::Result;
use crate::state::AppState;

/// Chat service for business logic
pub struct ChatService;

impl ChatService {
    /// Open a chat between a client and a host
    pub fn open(
        state: &AppState,
        booking_id: Option<&str>,
        client_id: &str,
        host_id: &str,
    ) -> Result<Chat> {
        // Both parties must resolve to identities.
        state.sqlite.get_user(client_id)?;
        state.sqlite.get_provider(host_id)?;
        if let Some(booking_id) = booking_id {
            state.sqlite.get_booking(booking_id)?;
        }
        let chat = state.sqlite.create_chat(booking_id, client_id, host_id)?;
        state.publish_change_with("chats", &chat.id, "created", &chat);
        Ok(chat)
    }

    pub fn get(state: &AppState, id: &str) -> Result<Chat> {
        state.sqlite.get_chat(id)
    }

    pub fn list_for_user(state: &AppState, user_id: &str) -> Result<Vec<Chat>> {
        state.sqlite.list_chats_for_user(user_id)
    }

    /// Send a message; sender must be a chat participant.
    pub fn send(state: &AppState, chat_id: &str, sender_id: &str, body: &str) -> Result<Message> {
        let message = state.sqlite.append_message(chat_id, sender_id, body)?;
        state.publish_change_with("messages", &message.id, "created", &message);
        state.publish_change("chats", chat_id, "updated");
        Ok(message)
    }

    pub fn messages(state: &AppState, chat_id: &str, limit: usize) -> Result<Vec<Message>> {
        state.sqlite.list_messages(chat_id, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::NewProvider;
    use crate::error::AppError;
    use tempfile::tempdir;

    fn seed_host(state: &AppState) -> String {
        state
            .sqlite
            .create_provider(&NewProvider {
                user_id: "u-jan".to_string(),
                display_name: "Jan".to_string(),
                categories: vec!["Hydraulik".to_string()],
                base_price: 100.0,
                lat: 52.4064,
                lng: 16.9252,
            })
            .unwrap()
            .id
    }

    #[test]
    fn test_send_updates_summary() {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        state.sqlite.upsert_user("c-1", "Anna", "client").unwrap();
        let host_id = seed_host(&state);
        let chat = ChatService::open(&state, None, "c-1", &host_id).unwrap();

        ChatService::send(&state, &chat.id, "c-1", "Dzien dobry").unwrap();
        ChatService::send(&state, &chat.id, &host_id, "Witam, w czym moge pomoc?").unwrap();

        let chat = ChatService::get(&state, &chat.id).unwrap();
        assert_eq!(chat.last_message.as_deref(), Some("Witam, w czym moge pomoc?"));
        assert_eq!(chat.last_sender_id.as_deref(), Some(host_id.as_str()));
        assert_eq!(ChatService::messages(&state, &chat.id, 50).unwrap().len(), 2);
    }

    #[test]
    fn test_outsider_cannot_send() {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        state.sqlite.upsert_user("c-1", "Anna", "client").unwrap();
        let host_id = seed_host(&state);
        let chat = ChatService::open(&state, None, "c-1", &host_id).unwrap();
        let result = ChatService::send(&state, &chat.id, "stranger", "hej");
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_open_requires_registered_host() {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        state.sqlite.upsert_user("c-1", "Anna", "client").unwrap();
        let result = ChatService::open(&state, None, "c-1", "ghost-host");
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
