pub mod client;
pub mod cohere;

pub use client::{ChatMessage, ChatRole, GenerationClient};
pub use cohere::CohereClient;
