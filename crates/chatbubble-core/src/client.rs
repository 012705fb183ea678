use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::WidgetConfig;
use crate::error::{ChatError, Result};
use crate::state::Source;

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    sources: Option<Vec<Source>>,
}

/// What the chat endpoint answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Server-reported application error, shown to the user as-is
    Error(String),
    Answer {
        response: String,
        sources: Vec<Source>,
    },
}

/// Decode a chat endpoint body.
///
/// A non-empty `error` wins over everything else. Without one, `response`
/// must be present.
pub fn parse_reply(body: &str) -> Result<Reply> {
    let parsed: ChatResponse = serde_json::from_str(body)?;

    if let Some(error) = parsed.error.filter(|e| !e.is_empty()) {
        return Ok(Reply::Error(error));
    }

    match parsed.response {
        Some(response) => Ok(Reply::Answer {
            response,
            sources: parsed.sources.unwrap_or_default(),
        }),
        None => Err(ChatError::MalformedReply(
            "response has neither `error` nor `response`".to_string(),
        )),
    }
}

/// Something that can deliver one user message and bring back the reply
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, message: &str) -> Result<Reply>;

    /// Ask the server to forget the conversation
    async fn clear_history(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct HttpChatClient {
    client: Client,
    chat_url: String,
    clear_url: String,
    context: Option<serde_json::Value>,
}

impl HttpChatClient {
    pub fn new(config: &WidgetConfig) -> Self {
        // No timeout: a request waits until the transport resolves or fails
        Self::with_client(config, Client::new())
    }

    pub fn with_client(config: &WidgetConfig, client: Client) -> Self {
        Self {
            client,
            chat_url: config.chat_url(),
            clear_url: config.clear_url(),
            context: config.context.clone(),
        }
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }
}

#[async_trait]
impl ChatTransport for HttpChatClient {
    async fn send(&self, message: &str) -> Result<Reply> {
        let request = ChatRequest {
            message,
            context: self.context.as_ref(),
        };

        let response = self
            .client
            .post(&self.chat_url)
            .json(&request)
            .send()
            .await?;

        // Error replies come back as 4xx/5xx with a JSON body, so the status
        // alone doesn't decide anything
        debug!("Chat endpoint status: {}", response.status());

        let body = response.text().await?;
        parse_reply(&body)
    }

    async fn clear_history(&self) -> Result<()> {
        let response = self.client.post(&self.clear_url).send().await?;
        debug!("Clear endpoint status: {}", response.status());
        response.error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response and hand back the raw request
    async fn serve_once(status: &str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                if request_complete(&raw) {
                    break;
                }
            }
            let reply = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).into_owned()
        });

        (format!("http://{}", addr), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    fn config_for(server: &str) -> WidgetConfig {
        WidgetConfig {
            server: server.to_string(),
            ..WidgetConfig::default()
        }
    }

    fn client_for(config: &WidgetConfig) -> HttpChatClient {
        // Keep proxy settings from the environment out of loopback tests
        let client = Client::builder().no_proxy().build().unwrap();
        HttpChatClient::with_client(config, client)
    }

    #[test]
    fn test_parse_answer_with_sources() {
        let reply = parse_reply(
            r#"{"response": "You need a **student visa**.", "sources": [{"title":"Dept. of Home Affairs","url":"https://example.gov/visa"}]}"#,
        )
        .unwrap();
        assert_eq!(
            reply,
            Reply::Answer {
                response: "You need a **student visa**.".to_string(),
                sources: vec![Source {
                    title: "Dept. of Home Affairs".to_string(),
                    url: "https://example.gov/visa".to_string(),
                }],
            }
        );
    }

    #[test]
    fn test_parse_answer_without_sources() {
        let reply = parse_reply(r#"{"response": "ok"}"#).unwrap();
        assert_eq!(
            reply,
            Reply::Answer {
                response: "ok".to_string(),
                sources: Vec::new()
            }
        );
    }

    #[test]
    fn test_parse_error_wins() {
        let reply = parse_reply(r#"{"error": "Rate limit exceeded", "response": "ignored"}"#).unwrap();
        assert_eq!(reply, Reply::Error("Rate limit exceeded".to_string()));
    }

    #[test]
    fn test_parse_empty_error_is_ignored() {
        let reply = parse_reply(r#"{"error": "", "response": "fine"}"#).unwrap();
        assert!(matches!(reply, Reply::Answer { .. }));
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(parse_reply("<html>502</html>"), Err(ChatError::Decode(_))));
        assert!(matches!(parse_reply("{}"), Err(ChatError::MalformedReply(_))));
    }

    #[tokio::test]
    async fn test_send_posts_json_message() {
        let (server, handle) = serve_once("200 OK", r#"{"response": "hello", "sources": []}"#).await;
        let client = client_for(&config_for(&server));

        let reply = client.send("What visa do I need?").await.unwrap();
        assert_eq!(
            reply,
            Reply::Answer {
                response: "hello".to_string(),
                sources: Vec::new()
            }
        );

        let request = handle.await.unwrap();
        assert!(request.starts_with("POST /api/chat HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("content-type: application/json"));
        assert!(request.ends_with(r#"{"message":"What visa do I need?"}"#));
    }

    #[tokio::test]
    async fn test_send_includes_context_when_configured() {
        let (server, handle) = serve_once("200 OK", r#"{"response": "ok"}"#).await;
        let mut config = config_for(&server);
        config.context = Some(serde_json::json!({"visa_subclass": "500"}));
        let client = client_for(&config);

        client.send("hi").await.unwrap();
        let request = handle.await.unwrap();
        assert!(request.ends_with(r#"{"message":"hi","context":{"visa_subclass":"500"}}"#));
    }

    #[tokio::test]
    async fn test_error_body_on_failure_status() {
        let (server, _handle) = serve_once(
            "503 Service Unavailable",
            r#"{"error": "AI Assistant not available."}"#,
        )
        .await;
        let client = client_for(&config_for(&server));
        let reply = client.send("hi").await.unwrap();
        assert_eq!(reply, Reply::Error("AI Assistant not available.".to_string()));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&config_for(&format!("http://{}", addr)));
        let err = client.send("hi").await.unwrap_err();
        assert!(matches!(err, ChatError::Transport(_)));
    }

    #[tokio::test]
    async fn test_clear_history_posts_to_clear_endpoint() {
        let (server, handle) = serve_once("200 OK", r#"{"status": "ok"}"#).await;
        let client = client_for(&config_for(&server));
        client.clear_history().await.unwrap();
        let request = handle.await.unwrap();
        assert!(request.starts_with("POST /api/chat/clear HTTP/1.1"));
    }
}
