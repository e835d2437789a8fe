//! SQLite persistence for apps, conversations and messages.

mod sequence;
mod sqlite;
mod types;

pub use sequence::SequenceAllocator;
pub use sqlite::{SqliteChatStore, connect_pool};
pub use types::{App, Conversation, Message, MessageRole, NewApp};
