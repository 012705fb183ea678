//! HTML rendering of the widget.
//!
//! The renderer works on a small element tree instead of strings so that a
//! [`Mount`] can apply incremental patches computed by [`diff`].

use crate::config::WidgetConfig;
use crate::markup::{escape_user_text, format_assistant_html};
use crate::state::{Entry, EntryKind, Visibility, WidgetState};

const BUBBLE_STYLE: &str = "max-width: 85%; padding: 12px 16px; border-radius: 16px; font-size: 14px; line-height: 1.5;";
const NEUTRAL_BUBBLE: &str = "background: rgba(255, 255, 255, 0.05); border: 1px solid rgba(255, 255, 255, 0.08); color: #f8fafc;";
const USER_BUBBLE: &str = "background: linear-gradient(135deg, #557aff, #00f2fe); color: white;";
const ERROR_BUBBLE: &str = "background: rgba(255, 77, 77, 0.15); border: 1px solid rgba(255, 77, 77, 0.3); color: #ff4d4d;";
const LEFT_ROW: &str = "display: flex; flex-direction: column; align-items: flex-start;";
const RIGHT_ROW: &str = "display: flex; flex-direction: column; align-items: flex-end;";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Plain text, escaped on output
    Text(String),
    /// Already-formatted markup, written as-is
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: &'static str,
    pub attrs: Vec<(&'static str, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(Node::Text(text.into()))
    }

    pub fn raw(self, html: impl Into<String>) -> Self {
        self.child(Node::Raw(html.into()))
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &'static str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(n, _)| *n != name);
    }

    pub fn id(&self) -> Option<&str> {
        self.get_attr("id")
    }

    /// Depth-first search by id, including `self`
    pub fn find_mut(&mut self, id: &str) -> Option<&mut Element> {
        if self.id() == Some(id) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| match child {
            Node::Element(el) => el.find_mut(id),
            _ => None,
        })
    }

    pub fn find(&self, id: &str) -> Option<&Element> {
        if self.id() == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|child| match child {
            Node::Element(el) => el.find(id),
            _ => None,
        })
    }

    /// Every descendant element (not `self`) with the given tag, in document order
    pub fn descendants_by_tag(&self, tag: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        for child in &self.children {
            if let Node::Element(el) = child {
                if el.tag == tag {
                    found.push(el);
                }
                found.extend(el.descendants_by_tag(tag));
            }
        }
        found
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

impl Node {
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_node(self, &mut out);
        out
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

fn is_void(tag: &str) -> bool {
    matches!(tag, "input" | "br")
}

fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(el.tag);
    for (name, value) in &el.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push('>');
    if is_void(el.tag) {
        return;
    }
    for child in &el.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(el.tag);
    out.push('>');
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Element(el) => write_element(el, out),
        Node::Text(text) => out.push_str(&escape_text(text)),
        Node::Raw(html) => out.push_str(html),
    }
}

/// Element id of a transcript entry
pub fn entry_element_id(config: &WidgetConfig, entry: &Entry) -> String {
    config.element_id(&format!("entry-{}", entry.id.0))
}

pub fn render_entry(config: &WidgetConfig, entry: &Entry) -> Element {
    let (row_style, bubble_style) = match entry.kind {
        EntryKind::User => (RIGHT_ROW, USER_BUBBLE),
        EntryKind::Error => (LEFT_ROW, ERROR_BUBBLE),
        EntryKind::Greeting | EntryKind::Assistant | EntryKind::Typing => (LEFT_ROW, NEUTRAL_BUBBLE),
    };
    let kind_class = match entry.kind {
        EntryKind::Greeting => "greeting",
        EntryKind::User => "user",
        EntryKind::Assistant => "assistant",
        EntryKind::Error => "error",
        EntryKind::Typing => "typing-indicator",
    };

    let mut bubble = Element::new("div")
        .attr("class", "chat-bubble")
        .attr("style", format!("{} {}", BUBBLE_STYLE, bubble_style));

    match entry.kind {
        EntryKind::User => {
            bubble = bubble.raw(escape_user_text(&entry.content));
        }
        EntryKind::Assistant | EntryKind::Greeting => {
            bubble = bubble.raw(format_assistant_html(&entry.content));
            if !entry.sources.is_empty() {
                bubble = bubble.child(render_sources(entry));
            }
        }
        // Server-controlled text, inserted verbatim
        EntryKind::Error => {
            bubble = bubble.raw(entry.content.clone());
        }
        EntryKind::Typing => {
            let mut dots = Element::new("div").attr("style", "display: flex; gap: 4px;");
            for delay in ["0s", "0.2s", "0.4s"] {
                dots = dots.child(Element::new("div").attr(
                    "style",
                    format!(
                        "width: 8px; height: 8px; border-radius: 50%; background: #94a3b8; animation: typing 1.4s {} infinite;",
                        delay
                    ),
                ));
            }
            bubble = bubble.child(dots);
        }
    }

    Element::new("div")
        .attr("id", entry_element_id(config, entry))
        .attr("class", format!("chat-entry {}", kind_class))
        .attr("style", row_style)
        .child(bubble)
}

fn render_sources(entry: &Entry) -> Element {
    let mut block = Element::new("div")
        .attr("class", "chat-sources")
        .attr(
            "style",
            "font-size: 11px; color: #94a3b8; margin-top: 10px; padding-top: 10px; border-top: 1px solid rgba(255,255,255,0.1);",
        )
        .child(Element::new("strong").text("Sources:"))
        .child(Element::new("br"));

    for source in &entry.sources {
        block = block.child(
            Element::new("a")
                .attr("href", source.url.clone())
                .attr("target", "_blank")
                .attr(
                    "style",
                    "color: #00f2fe; text-decoration: none; display: block; margin-top: 4px; white-space: nowrap; overflow: hidden; text-overflow: ellipsis;",
                )
                .text(format!("• {}", source.title)),
        );
    }
    block
}

fn toggle_style(visibility: Visibility) -> String {
    let display = match visibility {
        Visibility::Closed => "flex",
        Visibility::Open => "none",
    };
    format!(
        "position: fixed; bottom: 30px; right: 30px; width: 60px; height: 60px; border-radius: 50%; background: linear-gradient(135deg, #557aff, #00f2fe); border: none; cursor: pointer; display: {}; align-items: center; justify-content: center; z-index: 9999;",
        display
    )
}

fn panel_style(visibility: Visibility) -> String {
    let display = match visibility {
        Visibility::Closed => "none",
        Visibility::Open => "flex",
    };
    format!(
        "position: fixed; bottom: 30px; right: 30px; width: 400px; height: 600px; background: rgba(17, 24, 39, 0.95); border: 1px solid rgba(255, 255, 255, 0.08); border-radius: 24px; display: {}; flex-direction: column; z-index: 10000;",
        display
    )
}

fn send_style(busy: bool) -> String {
    format!(
        "width: 44px; height: 44px; border-radius: 12px; background: linear-gradient(135deg, #557aff, #00f2fe); border: none; cursor: pointer; opacity: {};",
        if busy { "0.7" } else { "1" }
    )
}

pub fn render_toggle(config: &WidgetConfig, state: &WidgetState) -> Element {
    Element::new("button")
        .attr("id", config.element_id("toggle"))
        .attr("aria-label", "Open chat")
        .attr("style", toggle_style(state.visibility))
        .text("💬")
}

pub fn render_panel(config: &WidgetConfig, state: &WidgetState) -> Element {
    let header = Element::new("div")
        .attr(
            "style",
            "padding: 20px; border-bottom: 1px solid rgba(255, 255, 255, 0.08); display: flex; justify-content: space-between; align-items: center;",
        )
        .child(
            Element::new("div")
                .child(
                    Element::new("div")
                        .attr("style", "font-size: 18px; font-weight: 700; color: #f8fafc;")
                        .text(config.title.clone()),
                )
                .child(
                    Element::new("div")
                        .attr("style", "font-size: 12px; color: #94a3b8; margin-top: 4px;")
                        .text(config.subtitle.clone()),
                ),
        )
        .child(
            Element::new("button")
                .attr("id", config.element_id("close"))
                .attr("aria-label", "Close chat")
                .attr("style", "background: none; border: none; color: #94a3b8; font-size: 24px; cursor: pointer;")
                .text("✕"),
        );

    let mut messages = Element::new("div").attr("id", config.element_id("messages")).attr(
        "style",
        "flex: 1; overflow-y: auto; padding: 20px; display: flex; flex-direction: column; gap: 16px;",
    );
    for entry in state.transcript.entries() {
        messages = messages.child(render_entry(config, entry));
    }

    let mut input = Element::new("input")
        .attr("type", "text")
        .attr("id", config.element_id("input"))
        .attr("placeholder", config.placeholder.clone())
        .attr("value", state.input.clone())
        .attr(
            "style",
            "flex: 1; background: rgba(255, 255, 255, 0.05); border: 1px solid rgba(255, 255, 255, 0.08); border-radius: 12px; padding: 12px 16px; color: #f8fafc; font-size: 14px; outline: none;",
        );
    let mut send = Element::new("button")
        .attr("id", config.element_id("send"))
        .attr("aria-label", "Send")
        .attr("style", send_style(state.is_busy()))
        .text("➤");
    if state.is_busy() {
        input.set_attr("disabled", "disabled");
        send.set_attr("disabled", "disabled");
    }

    let footer = Element::new("div")
        .attr(
            "style",
            "padding: 20px; border-top: 1px solid rgba(255, 255, 255, 0.08); display: flex; gap: 12px;",
        )
        .child(input)
        .child(send);

    Element::new("div")
        .attr("id", config.element_id("panel"))
        .attr("style", panel_style(state.visibility))
        .child(header)
        .child(messages)
        .child(footer)
}

/// One incremental change to a mounted widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    SetVisibility(Visibility),
    SetBusy(bool),
    SetInputValue(String),
    /// Append an entry to the message list
    Append(Element),
    /// Remove the element with this id from the message list
    Remove(String),
    ScrollToBottom,
}

/// Compute the patches that turn the rendering of `prev` into that of `next`.
///
/// Relies on the transcript being append-only: entries are either kept,
/// removed, or new with a higher id.
pub fn diff(config: &WidgetConfig, prev: &WidgetState, next: &WidgetState) -> Vec<Patch> {
    let mut patches = Vec::new();

    if prev.visibility != next.visibility {
        patches.push(Patch::SetVisibility(next.visibility));
    }
    if prev.is_busy() != next.is_busy() {
        patches.push(Patch::SetBusy(next.is_busy()));
    }
    if prev.input != next.input {
        patches.push(Patch::SetInputValue(next.input.clone()));
    }

    let next_entries = next.transcript.entries();
    for entry in prev.transcript.entries() {
        if !next_entries.iter().any(|e| e.id == entry.id) {
            patches.push(Patch::Remove(entry_element_id(config, entry)));
        }
    }

    let newest_prev = prev.transcript.entries().iter().map(|e| e.id).max();
    for entry in next_entries {
        if newest_prev.map_or(true, |id| entry.id > id) {
            patches.push(Patch::Append(render_entry(config, entry)));
        }
    }

    if prev.scroll_generation != next.scroll_generation {
        patches.push(Patch::ScrollToBottom);
    }

    patches
}

/// A widget mounted into an in-memory container.
///
/// Holds the two top-level elements and keeps them in sync by applying
/// [`Patch`]es. Several mounts can coexist as long as their id prefixes differ.
#[derive(Debug, Clone)]
pub struct Mount {
    container_id: String,
    toggle: Element,
    panel: Element,
    toggle_id: String,
    panel_id: String,
    messages_id: String,
    input_id: String,
    send_id: String,
    scrolled_to_bottom: u64,
}

impl Mount {
    pub fn new(container_id: &str, config: &WidgetConfig, state: &WidgetState) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            container_id: container_id.to_string(),
            toggle: render_toggle(config, state),
            panel: render_panel(config, state),
            toggle_id: config.element_id("toggle"),
            panel_id: config.element_id("panel"),
            messages_id: config.element_id("messages"),
            input_id: config.element_id("input"),
            send_id: config.element_id("send"),
            scrolled_to_bottom: 0,
        })
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn apply(&mut self, patches: &[Patch]) {
        for patch in patches {
            self.apply_one(patch);
        }
    }

    fn apply_one(&mut self, patch: &Patch) {
        match patch {
            Patch::SetVisibility(visibility) => {
                self.toggle.set_attr("style", toggle_style(*visibility));
                self.panel.set_attr("style", panel_style(*visibility));
            }
            Patch::SetBusy(busy) => {
                for id in [self.input_id.clone(), self.send_id.clone()] {
                    if let Some(el) = self.panel.find_mut(&id) {
                        if *busy {
                            el.set_attr("disabled", "disabled");
                        } else {
                            el.remove_attr("disabled");
                        }
                    }
                }
                if let Some(send) = self.panel.find_mut(&self.send_id) {
                    send.set_attr("style", send_style(*busy));
                }
            }
            Patch::SetInputValue(value) => {
                if let Some(input) = self.panel.find_mut(&self.input_id) {
                    input.set_attr("value", value.clone());
                }
            }
            Patch::Append(entry) => {
                if let Some(list) = self.panel.find_mut(&self.messages_id) {
                    list.children.push(Node::Element(entry.clone()));
                }
            }
            Patch::Remove(id) => {
                if let Some(list) = self.panel.find_mut(&self.messages_id) {
                    list.children
                        .retain(|child| !matches!(child, Node::Element(el) if el.id() == Some(id.as_str())));
                }
            }
            Patch::ScrollToBottom => {
                self.scrolled_to_bottom += 1;
            }
        }
    }

    pub fn toggle(&self) -> &Element {
        &self.toggle
    }

    pub fn panel(&self) -> &Element {
        &self.panel
    }

    pub fn toggle_id(&self) -> &str {
        &self.toggle_id
    }

    pub fn panel_id(&self) -> &str {
        &self.panel_id
    }

    /// The message list element
    pub fn messages(&self) -> Option<&Element> {
        self.panel.find(&self.messages_id)
    }

    /// How many times the message list was scrolled to the bottom
    pub fn scroll_count(&self) -> u64 {
        self.scrolled_to_bottom
    }

    /// Both top-level elements, ready to append to a page body
    pub fn to_html(&self) -> String {
        format!("{}\n{}", self.toggle.to_html(), self.panel.to_html())
    }
}

/// Keyframes for the typing indicator dots, to be added to the page head once
pub fn stylesheet() -> &'static str {
    "@keyframes typing { 0%, 60%, 100% { opacity: 0.3; } 30% { opacity: 1; } }"
}
