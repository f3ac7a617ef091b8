//! Mapping rollout history onto two-party chat APIs.
//!
//! Chat APIs see the world from the assistant's side: the speaking role's own
//! messages become `assistant` turns, everything else becomes `user` turns.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::domain::errors::ServiceError;
use crate::domain::models::{Message, SpeakerRole};

/// Sent when a request would otherwise carry no user turn.
const EMPTY_CONVERSATION_PROMPT: &str = "(The conversation begins.)";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// History as alternating chat turns from `speaker`'s perspective.
///
/// System messages are directions to the speaker and ride along as user
/// text. Consecutive turns of the same role are merged, and the result always
/// starts and ends with a user turn.
pub fn to_chat_turns(speaker: SpeakerRole, history: &[Message]) -> Vec<ChatTurn> {
    let mut turns: Vec<ChatTurn> = Vec::with_capacity(history.len() + 1);

    for message in history.iter().filter(|m| !m.text.trim().is_empty()) {
        let (role, content) = match message.speaker {
            s if s == speaker => (ChatRole::Assistant, message.text.clone()),
            SpeakerRole::System => (ChatRole::User, format!("[Direction: {}]", message.text.trim())),
            _ => (ChatRole::User, message.text.clone()),
        };

        match turns.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(&content);
            }
            _ => turns.push(ChatTurn { role, content }),
        }
    }

    if turns.first().is_none_or(|t| t.role == ChatRole::Assistant) {
        turns.insert(
            0,
            ChatTurn {
                role: ChatRole::User,
                content: EMPTY_CONVERSATION_PROMPT.to_string(),
            },
        );
    }
    if turns.last().is_some_and(|t| t.role == ChatRole::Assistant) {
        turns.push(ChatTurn {
            role: ChatRole::User,
            content: "(Continue.)".to_string(),
        });
    }
    turns
}

/// Classify a non-success HTTP status.
///
/// 408, 409, 429 and 5xx are transient; any other status is permanent.
pub fn classify_status(status: StatusCode, body: &str) -> ServiceError {
    let message = format!("HTTP {}: {}", status.as_u16(), truncate(body, 300));
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::CONFLICT
        || status.is_server_error()
    {
        ServiceError::Unavailable(message)
    } else {
        ServiceError::Rejected(message)
    }
}

/// Classify a transport-level failure. Malformed bodies are permanent.
pub fn classify_transport(err: &reqwest::Error) -> ServiceError {
    if err.is_decode() || err.is_builder() {
        ServiceError::Rejected(err.to_string())
    } else {
        ServiceError::Unavailable(err.to_string())
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(speaker: SpeakerRole, text: &str) -> Message {
        Message::new(speaker, text, 0)
    }

    #[test]
    fn test_persona_perspective() {
        let history = vec![
            msg(SpeakerRole::Interlocutor, "Hi, how are you?"),
            msg(SpeakerRole::Persona, "Fine."),
            msg(SpeakerRole::Interlocutor, "Really?"),
        ];
        let turns = to_chat_turns(SpeakerRole::Persona, &history);
        let roles: Vec<ChatRole> = turns.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![ChatRole::User, ChatRole::Assistant, ChatRole::User]);
    }

    #[test]
    fn test_counterpart_perspective_flips_roles() {
        let history = vec![msg(SpeakerRole::Persona, "I can't sleep.")];
        let turns = to_chat_turns(SpeakerRole::Interlocutor, &history);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, ChatRole::User);
        assert_eq!(turns[0].content, "I can't sleep.");
    }

    #[test]
    fn test_system_direction_merges_into_user_turn() {
        let history = vec![
            msg(SpeakerRole::Interlocutor, "Go on."),
            msg(SpeakerRole::System, "Vary your phrasing."),
        ];
        let turns = to_chat_turns(SpeakerRole::Persona, &history);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "Go on.\n\n[Direction: Vary your phrasing.]");
    }

    #[test]
    fn test_always_starts_and_ends_with_user() {
        let turns = to_chat_turns(SpeakerRole::Persona, &[msg(SpeakerRole::Persona, "Hello.")]);
        assert_eq!(turns.first().unwrap().role, ChatRole::User);
        assert_eq!(turns.last().unwrap().role, ChatRole::User);

        let empty = to_chat_turns(SpeakerRole::Persona, &[]);
        assert_eq!(empty.len(), 1);
        assert_eq!(empty[0].role, ChatRole::User);
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(classify_status(StatusCode::BAD_REQUEST, "policy").is_permanent());
        assert!(classify_status(StatusCode::UNAUTHORIZED, "").is_permanent());
    }
}
