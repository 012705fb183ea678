//! Chat bubble widget core.
//!
//! A floating chat widget that relays user messages to a chat endpoint and
//! renders the replies. Hosts drive it through [`ChatWidget`]; the state
//! transitions themselves live in [`reducer`] and can be used on their own.

pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod markup;
pub mod reducer;
pub mod render;
pub mod state;
pub mod widget;

// Re-export main types for convenience
pub use client::{parse_reply, ChatTransport, HttpChatClient, Reply};
pub use config::WidgetConfig;
pub use error::{ChatError, Result};
pub use guard::{RequestGuard, RequestToken};
pub use markup::{escape_user_text, format_assistant_html, parse_inline, Segment};
pub use reducer::{reduce, ChatEvent, Command, Transition, CONNECTION_ERROR_MESSAGE};
pub use render::{diff, Mount, Patch};
pub use state::{Entry, EntryId, EntryKind, Source, Transcript, Visibility, WidgetState};
pub use widget::{ChatWidget, PendingRequest};
