//! Chats and messages
//!
//! Message append and the conversation summary update run in one
//! transaction, so the chat list preview can never disagree with the
//! message log.

use super::models::{Chat, Message};
use crate::error::{AppError, Result};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const CHAT_COLUMNS: &str =
    "id, booking_id, client_id, host_id, last_message, last_sender_id, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, chat_id, sender_id, body, created_at";

fn row_to_chat(row: &Row<'_>) -> rusqlite::Result<Chat> {
    Ok(Chat {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        client_id: row.get(2)?,
        host_id: row.get(3)?,
        last_message: row.get(4)?,
        last_sender_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        sender_id: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Open a conversation between a client and a host
pub fn create(
    conn: &Connection,
    booking_id: Option<&str>,
    client_id: &str,
    host_id: &str,
) -> Result<Chat> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO chats (id, booking_id, client_id, host_id) VALUES (?1, ?2, ?3, ?4)",
        params![id, booking_id, client_id, host_id],
    )?;
    get(conn, &id)
}

/// Get chat by id
pub fn get(conn: &Connection, id: &str) -> Result<Chat> {
    conn.query_row(
        &format!("SELECT {} FROM chats WHERE id = ?1", CHAT_COLUMNS),
        params![id],
        row_to_chat,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound(format!("chat {}", id)),
        other => other.into(),
    })
}

/// Chats a user participates in, most recently active first
pub fn list_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Chat>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM chats WHERE client_id = ?1 OR host_id = ?1 ORDER BY updated_at DESC",
        CHAT_COLUMNS
    ))?;
    let chats = stmt
        .query_map(params![user_id], row_to_chat)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(chats)
}

/// Append a message and refresh the conversation summary atomically
pub fn append_message(
    conn: &mut Connection,
    chat_id: &str,
    sender_id: &str,
    body: &str,
) -> Result<Message> {
    if body.trim().is_empty() {
        return Err(AppError::Validation("message body is empty".to_string()));
    }

    let chat = get(conn, chat_id)?;
    if sender_id != chat.client_id && sender_id != chat.host_id {
        return Err(AppError::Validation(format!(
            "{} is not a participant of chat {}",
            sender_id, chat_id
        )));
    }

    let id = Uuid::new_v4().to_string();
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO messages (id, chat_id, sender_id, body) VALUES (?1, ?2, ?3, ?4)",
        params![id, chat_id, sender_id, body],
    )?;
    tx.execute(
        "UPDATE chats SET last_message = ?2, last_sender_id = ?3, updated_at = datetime('now')
         WHERE id = ?1",
        params![chat_id, body, sender_id],
    )?;
    tx.commit()?;

    conn.query_row(
        &format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS),
        params![id],
        row_to_message,
    )
    .map_err(Into::into)
}

/// Messages in a chat, oldest first
pub fn list_messages(conn: &Connection, chat_id: &str, limit: usize) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM messages WHERE chat_id = ?1 ORDER BY created_at ASC, id ASC LIMIT ?2",
        MESSAGE_COLUMNS
    ))?;
    let messages = stmt
        .query_map(params![chat_id, limit as i64], row_to_message)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(messages)
}
