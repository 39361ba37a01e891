mod chat_list;
mod thread;

pub use chat_list::{ChatListState, ChatListStore, ConversationEntry};
pub use thread::{ThreadState, ThreadStore};
