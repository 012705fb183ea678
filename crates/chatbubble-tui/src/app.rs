use std::sync::Arc;
use std::time::Instant;

use chatbubble_core::{
    ChatError, ChatEvent, ChatTransport, ChatWidget, Command, HttpChatClient, Reply, RequestToken,
    WidgetConfig,
};
use log::{info, warn};
use ratatui::layout::Rect;
use tokio::task::JoinHandle;

pub type RequestTask = JoinHandle<chatbubble_core::Result<Reply>>;

pub struct App<T: ChatTransport + ?Sized + 'static = HttpChatClient> {
    pub should_quit: bool,
    pub widget: ChatWidget<T>,

    // Input state
    pub input_cursor: usize, // cursor position in chars
    pub input_focused: bool,
    pub focus_at: Option<Instant>,

    // Transcript scrolling
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the transcript area, set during render
    pub seen_scroll_generation: u64,

    // The one outstanding request, if any
    pub request: Option<(RequestToken, RequestTask)>,
    // Server-side clear still on the wire; later calls wait for it
    pub clearing: Option<JoinHandle<()>>,

    // Animation state
    pub animation_frame: u8,

    // Areas for mouse hit-testing (updated during render)
    pub toggle_area: Option<Rect>,
    pub close_area: Option<Rect>,
    pub input_area: Option<Rect>,
    pub send_area: Option<Rect>,
}

impl App<HttpChatClient> {
    pub fn new(config: WidgetConfig) -> chatbubble_core::Result<Self> {
        let client = Arc::new(HttpChatClient::new(&config));
        info!("Chat endpoint: {}", client.chat_url());
        Self::with_transport(config, client)
    }
}

impl<T: ChatTransport + ?Sized + 'static> App<T> {
    pub fn with_transport(config: WidgetConfig, transport: Arc<T>) -> chatbubble_core::Result<Self> {
        let widget = ChatWidget::mount("terminal", config, transport)?;
        Ok(Self {
            should_quit: false,
            widget,
            input_cursor: 0,
            input_focused: false,
            focus_at: None,
            chat_scroll: 0,
            chat_height: 0,
            seen_scroll_generation: 0,
            request: None,
            clearing: None,
            animation_frame: 0,
            toggle_area: None,
            close_area: None,
            input_area: None,
            send_area: None,
        })
    }

    pub fn is_open(&self) -> bool {
        self.widget.state().is_open()
    }

    pub fn input(&self) -> &str {
        &self.widget.state().input
    }

    /// Input accepts keystrokes only when focused and no request is outstanding
    pub fn can_edit(&self) -> bool {
        self.is_open() && self.input_focused && !self.widget.state().is_busy()
    }

    pub fn open(&mut self) {
        self.widget.open();
        self.apply_focus_request();
    }

    pub fn close(&mut self) {
        self.widget.close();
        self.input_focused = false;
        self.focus_at = None;
    }

    pub fn set_input(&mut self, text: String, cursor: usize) {
        self.widget.set_input(text);
        self.input_cursor = cursor;
    }

    /// Accept the current input and start the request in the background
    pub fn send(&mut self) {
        let Some(pending) = self.widget.begin_send() else {
            return;
        };
        self.input_cursor = 0;
        self.input_focused = false;

        let transport = self.widget.transport();
        let message = pending.message;
        let clearing = self.clearing.take();
        let handle = tokio::spawn(async move {
            // The server must forget the old conversation before it sees this message
            if let Some(clearing) = clearing {
                let _ = clearing.await;
            }
            transport.send(&message).await
        });
        self.request = Some((pending.token, handle));
    }

    /// Hand a finished request back to the widget
    pub async fn poll_request(&mut self) {
        let finished = self
            .request
            .as_ref()
            .map_or(false, |(_, handle)| handle.is_finished());
        if !finished {
            return;
        }

        if let Some((token, handle)) = self.request.take() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(ChatError::Interrupted(e.to_string())),
            };
            self.widget.complete(token, outcome);
            self.apply_focus_request();
        }
    }

    /// Reset the conversation here and on the server
    pub fn clear_conversation(&mut self) {
        if self.widget.state().is_busy() {
            return;
        }
        self.widget.dispatch(ChatEvent::ClearConversation);
        self.chat_scroll = 0;

        let transport = self.widget.transport();
        let previous = self.clearing.take();
        self.clearing = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            if let Err(e) = transport.clear_history().await {
                warn!("Could not clear server-side history: {}", e);
            }
        }));
    }

    fn apply_focus_request(&mut self) {
        match self.widget.take_focus_request() {
            Some(Command::FocusInput { after_open: true }) => {
                // Give the panel a moment to appear before focusing
                self.focus_at = Some(Instant::now() + self.widget.config().focus_delay());
            }
            Some(Command::FocusInput { after_open: false }) => {
                self.focus_at = None;
                self.input_focused = self.is_open();
            }
            _ => {}
        }
    }

    /// Called on every Tick event
    pub fn tick(&mut self) {
        if self.widget.state().is_busy() {
            self.animation_frame = self.animation_frame.wrapping_add(1);
        }
        if let Some(at) = self.focus_at {
            if Instant::now() >= at {
                self.focus_at = None;
                self.input_focused = self.is_open();
            }
        }
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    /// Jump to the bottom if the widget asked for it since the last frame
    pub fn follow_transcript(&mut self, total_lines: u16) {
        let generation = self.widget.state().scroll_generation;
        if generation != self.seen_scroll_generation {
            self.seen_scroll_generation = generation;
            self.chat_scroll = total_lines.saturating_sub(self.chat_height);
        } else {
            // Keep manual scrolling within the content
            self.chat_scroll = self
                .chat_scroll
                .min(total_lines.saturating_sub(self.chat_height));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatbubble_core::{EntryKind, Visibility};
    use std::time::Duration;

    /// Echoes the message back as a bold answer
    struct Fake;

    #[async_trait]
    impl ChatTransport for Fake {
        async fn send(&self, message: &str) -> chatbubble_core::Result<Reply> {
            Ok(Reply::Answer {
                response: format!("echo: **{}**", message),
                sources: Vec::new(),
            })
        }

        async fn clear_history(&self) -> chatbubble_core::Result<()> {
            Ok(())
        }
    }

    fn app() -> App<Fake> {
        let config = WidgetConfig {
            focus_delay_ms: 0,
            ..WidgetConfig::default()
        };
        App::with_transport(config, Arc::new(Fake)).unwrap()
    }

    #[tokio::test]
    async fn test_open_focuses_after_delay() {
        let mut app = app();
        app.open();
        assert_eq!(app.widget.state().visibility, Visibility::Open);
        assert!(!app.input_focused);
        tokio::time::sleep(Duration::from_millis(5)).await;
        app.tick();
        assert!(app.input_focused);
        assert!(app.can_edit());

        app.close();
        assert!(!app.input_focused);
        assert!(!app.can_edit());
    }

    #[tokio::test]
    async fn test_send_round_trip() {
        let mut app = app();
        app.open();
        app.set_input("hello".to_string(), 5);
        app.send();
        assert!(app.widget.state().is_busy());
        assert!(!app.can_edit());
        assert!(app.input().is_empty());

        let (_, handle) = app.request.as_ref().unwrap();
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
        app.poll_request().await;

        assert!(app.request.is_none());
        assert!(!app.widget.state().is_busy());
        assert!(app.input_focused);
        let last = app.widget.state().transcript.last().unwrap();
        assert_eq!(last.kind, EntryKind::Assistant);
        assert_eq!(last.content, "echo: **hello**");
    }

    #[tokio::test]
    async fn test_blank_send_starts_nothing() {
        let mut app = app();
        app.open();
        app.set_input("  ".to_string(), 2);
        app.send();
        assert!(app.request.is_none());
        assert_eq!(app.widget.state().transcript.len(), 1);
    }

    /// Records the order in which the server sees calls; clearing is slow
    #[derive(Default)]
    struct Ordered {
        calls: std::sync::Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl ChatTransport for Ordered {
        async fn send(&self, _message: &str) -> chatbubble_core::Result<Reply> {
            self.calls.lock().unwrap().push("send");
            Ok(Reply::Answer {
                response: "ok".to_string(),
                sources: Vec::new(),
            })
        }

        async fn clear_history(&self) -> chatbubble_core::Result<()> {
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.calls.lock().unwrap().push("clear");
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_send_after_clear_waits_for_clear() {
        let transport = Arc::new(Ordered::default());
        let mut app = App::with_transport(WidgetConfig::default(), transport.clone()).unwrap();
        app.open();
        app.clear_conversation();
        assert!(app.clearing.is_some());

        app.set_input("fresh start".to_string(), 11);
        app.send();
        assert!(app.clearing.is_none());

        let (_, handle) = app.request.as_ref().unwrap();
        while !handle.is_finished() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        app.poll_request().await;

        assert_eq!(*transport.calls.lock().unwrap(), vec!["clear", "send"]);
        assert_eq!(
            app.widget.state().transcript.last().unwrap().kind,
            EntryKind::Assistant
        );
    }

    #[test]
    fn test_follow_transcript() {
        let mut app = app();
        app.chat_height = 10;
        app.widget.set_input("x");
        // Nothing requested yet: manual scroll is clamped
        app.chat_scroll = 50;
        app.follow_transcript(30);
        assert_eq!(app.chat_scroll, 20);
    }
}
