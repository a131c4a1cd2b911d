use crate::llm::client::ChatMessage;

/// How many trailing entries the generation client gets to see.
pub const HISTORY_WINDOW: usize = 4;

/// Append-only conversation log. Storage is unbounded; only the reading side
/// is windowed. Entries always arrive in question/expression pairs.
#[derive(Debug, Default)]
pub struct ConversationLog {
    turns: Vec<ChatMessage>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed turn: the question and the raw generated
    /// expression, as a pair. Never one without the other.
    pub fn append_exchange(&mut self, question: impl Into<String>, generated: impl Into<String>) {
        self.turns.push(ChatMessage::user(question));
        self.turns.push(ChatMessage::chatbot(generated));
    }

    /// The window passed to the generation client: last entries,
    /// oldest-to-newest.
    pub fn recent(&self) -> &[ChatMessage] {
        let start = self.turns.len().saturating_sub(HISTORY_WINDOW);
        &self.turns[start..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
