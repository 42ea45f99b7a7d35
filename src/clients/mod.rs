pub mod openai;
pub mod traits;

pub use openai::OpenAiClient;
pub use traits::{ChatMessage, ChatModel, ContentPart, ImageUrl, MessageContent, ModelError, Role};
