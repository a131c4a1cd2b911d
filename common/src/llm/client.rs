use crate::error::Result;
use async_trait::async_trait;

/// The two-party vocabulary the generation API understands. Conversation
/// turns are mapped onto these roles at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Chatbot,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "USER",
            ChatRole::Chatbot => "CHATBOT",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn chatbot(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Chatbot,
            content: content.into(),
        }
    }
}

/// External capability that turns a question into one line of expression
/// text. Treated as untrusted and unreliable: callers must survive prose,
/// fences, and outright garbage in the returned text.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Produce candidate expression text for `question`, given the fixed
    /// preamble and a bounded window of prior turns. Transport failures
    /// surface as `GenerationUnavailable`, never as a silent empty string.
    async fn generate(
        &self,
        preamble: &str,
        history: &[ChatMessage],
        question: &str,
    ) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = ChatMessage::user("hi");
        assert_eq!(msg.role, ChatRole::User);
        assert_eq!(msg.content, "hi");
        assert_eq!(ChatRole::Chatbot.as_str(), "CHATBOT");
    }
}
