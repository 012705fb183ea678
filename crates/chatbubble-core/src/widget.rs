//! The chat widget controller.
//!
//! Owns the state, runs events through the reducer and keeps the mounted
//! rendering in sync. The network step is delegated to a [`ChatTransport`].

use std::sync::Arc;

use log::{error, info, warn};

use crate::client::{ChatTransport, Reply};
use crate::config::WidgetConfig;
use crate::error::Result;
use crate::guard::RequestToken;
use crate::reducer::{reduce, ChatEvent, Command};
use crate::render::{diff, Mount};
use crate::state::WidgetState;

/// A send accepted by the widget, waiting for the host to run it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub token: RequestToken,
    pub message: String,
}

pub struct ChatWidget<T: ChatTransport + ?Sized> {
    config: WidgetConfig,
    state: WidgetState,
    mount: Mount,
    transport: Arc<T>,
    /// Set when the host should move focus to the input
    focus_request: Option<Command>,
}

impl<T: ChatTransport + ?Sized> ChatWidget<T> {
    /// Build the widget and mount it into `container_id`
    pub fn mount(container_id: &str, config: WidgetConfig, transport: Arc<T>) -> Result<Self> {
        let state = WidgetState::new(&config.greeting);
        let mount = Mount::new(container_id, &config, &state)?;
        info!("Chat widget mounted into '{}'", container_id);
        Ok(Self {
            config,
            state,
            mount,
            transport,
            focus_request: None,
        })
    }

    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn mounted(&self) -> &Mount {
        &self.mount
    }

    pub fn transport(&self) -> Arc<T> {
        Arc::clone(&self.transport)
    }

    /// Run one event through the reducer and re-render.
    ///
    /// Returns the command the host has to carry out, if any. Focus commands
    /// are also remembered until [`take_focus_request`](Self::take_focus_request).
    pub fn dispatch(&mut self, event: ChatEvent) -> Option<Command> {
        match &event {
            ChatEvent::Open => info!("Opening chat panel"),
            ChatEvent::Close => info!("Closing chat panel"),
            ChatEvent::RequestFailed { error: e, .. } => error!("Chat request failed: {}", e),
            ChatEvent::ReplyReceived { reply: Reply::Error(e), .. } => error!("Chat API error: {}", e),
            ChatEvent::ReplyReceived { .. } => info!("Received chat response"),
            _ => {}
        }

        let prev = self.state.clone();
        let transition = reduce(prev.clone(), event);
        self.state = transition.state;
        self.mount.apply(&diff(&self.config, &prev, &self.state));

        if let Some(cmd @ Command::FocusInput { .. }) = &transition.command {
            self.focus_request = Some(cmd.clone());
        }
        transition.command
    }

    pub fn open(&mut self) {
        self.dispatch(ChatEvent::Open);
    }

    pub fn close(&mut self) {
        self.dispatch(ChatEvent::Close);
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.dispatch(ChatEvent::InputChanged(text.into()));
    }

    /// Accept the current input as a message, if it is non-blank and nothing
    /// else is in flight
    pub fn begin_send(&mut self) -> Option<PendingRequest> {
        match self.dispatch(ChatEvent::Submit) {
            Some(Command::Send { token, message }) => {
                info!("Sending message ({} chars)", message.chars().count());
                Some(PendingRequest { token, message })
            }
            _ => None,
        }
    }

    /// Feed the outcome of a request started with [`begin_send`](Self::begin_send)
    pub fn complete(&mut self, token: RequestToken, outcome: Result<Reply>) {
        if !self.state.guard.holds(token) {
            warn!("Ignoring completion for stale request {}", token.id());
            return;
        }
        let event = match outcome {
            Ok(reply) => ChatEvent::ReplyReceived { token, reply },
            Err(e) => ChatEvent::RequestFailed {
                token,
                error: e.to_string(),
            },
        };
        self.dispatch(event);
    }

    /// One full send cycle: accept input, call the endpoint, render the result.
    /// Returns `false` if the input was rejected.
    pub async fn submit(&mut self) -> bool {
        let Some(pending) = self.begin_send() else {
            return false;
        };
        let outcome = self.transport.send(&pending.message).await;
        self.complete(pending.token, outcome);
        true
    }

    /// Reset the transcript to the greeting and tell the server to forget
    /// the conversation. A server failure is logged and otherwise ignored.
    pub async fn clear_conversation(&mut self) {
        if self.state.is_busy() {
            return;
        }
        self.dispatch(ChatEvent::ClearConversation);
        if let Err(e) = self.transport.clear_history().await {
            warn!("Could not clear server-side history: {}", e);
        }
    }

    pub fn take_focus_request(&mut self) -> Option<Command> {
        self.focus_request.take()
    }
}
