pub mod backend;
pub mod error;
pub mod format;
pub mod history;
pub mod model;
pub mod render;
pub mod sanitize;
pub mod service;
pub mod transcript;

pub use backend::http::HttpBackend;
pub use backend::local::LocalBackend;
pub use backend::{BackendConfig, ChatBackend};
pub use error::{ChatviewError, Result};
pub use format::format_response;
pub use history::{Timeline, load_history, parse_history_listing, render_bot_text, replay};
pub use model::{
    AssistantReply, Attachment, ConversationSummary, DisplayMessage, MessageRole, RawTurnRecord,
};
pub use render::{render_listing_markdown, render_timeline_markdown, to_pretty_json};
pub use sanitize::{SanitizePolicy, sanitize};
pub use service::{
    ChatService, FALLBACK_REPLY, SendOutcome, attach_file, forget_conversation, start_new_chat,
};
pub use transcript::{parse_transcript, read_transcript, write_transcript};
