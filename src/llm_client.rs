use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};
use url::Url;

use crate::assistant::backend::{BackendConfig, BackendKind};
use crate::error::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// One call to the model: where to send it and what to send.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub backend: BackendConfig,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

/// Sends a conversation to a model endpoint and returns the generated text.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    error: Option<OpenAiError>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiError {
    message: String,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: Option<OllamaMessage>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

/// HTTP client for both the hosted OpenAI-compatible API and a local Ollama server.
pub struct HttpLlmClient {
    client: reqwest::Client,
}

impl HttpLlmClient {
    /// Build a client. `timeout` bounds each whole request; `None` leaves it
    /// to the transport defaults.
    pub fn new(timeout: Option<Duration>) -> Result<Self, LlmError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { client })
    }

    async fn complete_hosted(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = endpoint(&request.backend.base_url, "chat/completions")?;
        let body = OpenAiRequest {
            model: &request.backend.model,
            messages: &request.messages,
            temperature: request.temperature,
        };

        debug!("Sending request to {}: {}", url, serde_json::to_string_pretty(&body).unwrap_or_default());

        let mut builder = self.client.post(url).json(&body);
        if let Some(api_key) = &request.backend.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response_json = self.send(builder).await?;
        let response: OpenAiResponse = serde_json::from_value(response_json)
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        if let Some(err) = response.error {
            return Err(LlmError::BackendMessage(err.message));
        }

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::MalformedResponse("response has no choices".to_string()))?;

        non_empty(text)
    }

    async fn complete_local(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = endpoint(&request.backend.base_url, "api/chat")?;
        let body = OllamaRequest {
            model: &request.backend.model,
            messages: &request.messages,
            stream: false,
            options: OllamaOptions { temperature: request.temperature },
        };

        debug!("Sending request to {}: {}", url, serde_json::to_string_pretty(&body).unwrap_or_default());

        let response_json = self.send(self.client.post(url).json(&body)).await?;
        let response: OllamaResponse = serde_json::from_value(response_json)
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        if let Some(err) = response.error {
            return Err(LlmError::BackendMessage(err));
        }

        let text = response
            .message
            .map(|message| message.content)
            .ok_or_else(|| LlmError::MalformedResponse("response has no message".to_string()))?;

        non_empty(text)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value, LlmError> {
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("API request failed with status {}: {}", status, body);
            return Err(match status.as_u16() {
                401 | 403 => LlmError::Authentication { status: status.as_u16(), body },
                code => LlmError::Backend { status: code, body },
            });
        }

        let response_json: Value = response.json().await?;
        debug!("Received response: {}", serde_json::to_string_pretty(&response_json).unwrap_or_default());

        Ok(response_json)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        match request.backend.kind {
            BackendKind::Hosted => self.complete_hosted(&request).await,
            BackendKind::Local => self.complete_local(&request).await,
        }
    }
}

/// Join `path` onto `base`, treating `base` as a directory.
fn endpoint(base: &str, path: &str) -> Result<Url, LlmError> {
    let mut base = base.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Ok(Url::parse(&base)?.join(path)?)
}

/// A completion that is blank after trimming counts as malformed, so it is never recorded.
fn non_empty(text: String) -> Result<String, LlmError> {
    if text.trim().is_empty() {
        return Err(LlmError::MalformedResponse("empty completion".to_string()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;
    use crate::error::FailureCategory;

    fn request(backend: BackendConfig) -> CompletionRequest {
        CompletionRequest {
            backend,
            messages: vec![
                ChatMessage::system("You are a data analyst."),
                ChatMessage::user("How many rows?"),
            ],
            temperature: 0.2,
        }
    }

    #[test]
    fn test_endpoint_join() {
        assert_eq!(
            endpoint("https://openrouter.ai/api/v1", "chat/completions").unwrap().as_str(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
        assert_eq!(
            endpoint("http://localhost:11434/", "api/chat").unwrap().as_str(),
            "http://localhost:11434/api/chat"
        );
        assert!(endpoint("::nope::", "api/chat").is_err());
    }

    #[test]
    fn test_roles_serialize_lowercase() {
        let value = serde_json::to_value(ChatMessage::assistant("hi")).unwrap();
        assert_eq!(value, json!({ "role": "assistant", "content": "hi" }));
    }

    #[tokio::test]
    async fn test_hosted_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "mistralai/mistral-7b-instruct:free",
                "temperature": 0.2,
                "messages": [
                    { "role": "system", "content": "You are a data analyst." },
                    { "role": "user", "content": "How many rows?" }
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"100 rows."}}]}"#)
            .create_async()
            .await;

        let backend = BackendConfig::hosted("sk-test").with_base_url(format!("{}/api/v1", server.url()));
        let client = HttpLlmClient::new(None).unwrap();
        let text = client.complete(request(backend)).await.unwrap();

        assert_eq!(text, "100 rows.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_local_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::PartialJson(json!({
                "model": "mistral",
                "stream": false,
                "options": { "temperature": 0.2 }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"model":"mistral","message":{"role":"assistant","content":"42.0"},"done":true}"#)
            .create_async()
            .await;

        let backend = BackendConfig::local().with_base_url(server.url());
        let client = HttpLlmClient::new(Some(Duration::from_secs(5))).unwrap();
        let text = client.complete(request(backend)).await.unwrap();

        assert_eq!(text, "42.0");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_is_authentication_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"No auth credentials found"}}"#)
            .create_async()
            .await;

        let backend = BackendConfig::hosted("bad").with_base_url(server.url());
        let err = HttpLlmClient::new(None)
            .unwrap()
            .complete(request(backend))
            .await
            .unwrap_err();

        assert_eq!(err.category(), FailureCategory::Authentication);
        assert!(err.to_string().contains("No auth credentials found"));
    }

    #[tokio::test]
    async fn test_server_error_is_backend_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/chat")
            .with_status(500)
            .with_body("model not loaded")
            .create_async()
            .await;

        let backend = BackendConfig::local().with_base_url(server.url());
        let err = HttpLlmClient::new(None)
            .unwrap()
            .complete(request(backend))
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Backend { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_error_body_with_ok_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"message":"Rate limit exceeded","code":429}}"#)
            .create_async()
            .await;

        let backend = BackendConfig::hosted("key").with_base_url(server.url());
        let err = HttpLlmClient::new(None)
            .unwrap()
            .complete(request(backend))
            .await
            .unwrap_err();

        assert_eq!(err.category(), FailureCategory::Backend);
        assert!(err.to_string().contains("Rate limit exceeded"));
    }

    #[tokio::test]
    async fn test_missing_choices_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let backend = BackendConfig::hosted("key").with_base_url(server.url());
        let err = HttpLlmClient::new(None)
            .unwrap()
            .complete(request(backend))
            .await
            .unwrap_err();

        assert_eq!(err.category(), FailureCategory::MalformedResponse);
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/chat")
            .with_status(200)
            .with_body("<html>proxy page</html>")
            .create_async()
            .await;

        let backend = BackendConfig::local().with_base_url(server.url());
        let err = HttpLlmClient::new(None)
            .unwrap()
            .complete(request(backend))
            .await
            .unwrap_err();

        assert_eq!(err.category(), FailureCategory::MalformedResponse);
    }

    #[tokio::test]
    async fn test_silent_server_hits_configured_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept the connection and hold it open without ever answering.
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let backend = BackendConfig::local().with_base_url(format!("http://{}", addr));
        let err = HttpLlmClient::new(Some(Duration::from_millis(300)))
            .unwrap()
            .complete(request(backend))
            .await
            .unwrap_err();

        assert_eq!(err.category(), FailureCategory::Timeout);
        server.abort();
    }

    #[tokio::test]
    async fn test_blank_completion_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/chat")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"model":"mistral","message":{"role":"assistant","content":" "},"done":true}"#)
            .create_async()
            .await;

        let backend = BackendConfig::local().with_base_url(server.url());
        let err = HttpLlmClient::new(None)
            .unwrap()
            .complete(request(backend))
            .await
            .unwrap_err();

        assert_eq!(err.category(), FailureCategory::MalformedResponse);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_failure() {
        // Port 9 (discard) on loopback is almost never listening.
        let backend = BackendConfig::local().with_base_url("http://127.0.0.1:9");
        let err = HttpLlmClient::new(Some(Duration::from_secs(5)))
            .unwrap()
            .complete(request(backend))
            .await
            .unwrap_err();

        assert!(matches!(
            err.category(),
            FailureCategory::Network | FailureCategory::Timeout
        ));
    }
}
