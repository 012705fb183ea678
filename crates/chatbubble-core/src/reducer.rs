//! Pure state transitions for the widget.
//!
//! `reduce` never touches the network or a display. Side effects it wants
//! performed come back as a [`Command`] for the host to execute.

use crate::client::Reply;
use crate::guard::RequestToken;
use crate::state::{EntryKind, Visibility, WidgetState};

/// Shown for any transport or parse failure. The underlying error only goes to the log.
pub const CONNECTION_ERROR_MESSAGE: &str = "Sorry, I encountered an error connecting to the server. Please check your internet connection and try again.";

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Open,
    Close,
    InputChanged(String),
    /// Send button clicked or Enter pressed in the input
    Submit,
    ReplyReceived { token: RequestToken, reply: Reply },
    RequestFailed { token: RequestToken, error: String },
    ClearConversation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Issue exactly one request to the chat endpoint
    Send { token: RequestToken, message: String },
    /// Move focus to the input. `after_open` asks the host to wait for the
    /// panel to become visible first.
    FocusInput { after_open: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: WidgetState,
    pub command: Option<Command>,
}

impl Transition {
    fn unchanged(state: WidgetState) -> Self {
        Self { state, command: None }
    }
}

pub fn reduce(mut state: WidgetState, event: ChatEvent) -> Transition {
    match event {
        ChatEvent::Open => {
            state.visibility = Visibility::Open;
            Transition {
                state,
                command: Some(Command::FocusInput { after_open: true }),
            }
        }
        ChatEvent::Close => {
            state.visibility = Visibility::Closed;
            Transition::unchanged(state)
        }
        ChatEvent::InputChanged(text) => {
            state.input = text;
            Transition::unchanged(state)
        }
        ChatEvent::Submit => submit(state),
        ChatEvent::ReplyReceived { token, reply } => {
            if !state.guard.holds(token) {
                return Transition::unchanged(state);
            }
            state.transcript.remove_typing();
            match reply {
                Reply::Error(text) => {
                    state.transcript.push(EntryKind::Error, text, Vec::new());
                }
                Reply::Answer { response, sources } => {
                    state.transcript.push(EntryKind::Assistant, response, sources);
                }
            }
            state.scroll_to_bottom();
            finish(state, token)
        }
        ChatEvent::RequestFailed { token, .. } => {
            if !state.guard.holds(token) {
                return Transition::unchanged(state);
            }
            state.transcript.remove_typing();
            state
                .transcript
                .push(EntryKind::Error, CONNECTION_ERROR_MESSAGE.to_string(), Vec::new());
            finish(state, token)
        }
        ChatEvent::ClearConversation => {
            if !state.is_busy() {
                state.transcript.reset_to_greeting();
                state.scroll_to_bottom();
            }
            Transition::unchanged(state)
        }
    }
}

fn submit(mut state: WidgetState) -> Transition {
    let message = state.input.trim().to_string();
    if message.is_empty() {
        return Transition::unchanged(state);
    }
    let Some(token) = state.guard.try_acquire() else {
        return Transition::unchanged(state);
    };

    state.transcript.push(EntryKind::User, message.clone(), Vec::new());
    state.input.clear();
    state.scroll_to_bottom();
    state.transcript.push_typing();
    state.scroll_to_bottom();

    Transition {
        state,
        command: Some(Command::Send { token, message }),
    }
}

// Always runs at the end of a request, whatever the outcome
fn finish(mut state: WidgetState, token: RequestToken) -> Transition {
    state.guard.release(token);
    Transition {
        state,
        command: Some(Command::FocusInput { after_open: false }),
    }
}
