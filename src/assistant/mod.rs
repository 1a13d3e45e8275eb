//! Conversational assistant over a single dataset snapshot.

pub mod backend;
pub mod context;
pub mod history;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::dataset::DatasetView;
use crate::error::LlmError;
use crate::llm_client::{ChatMessage, CompletionRequest, LlmClient};
use backend::BackendConfig;
use context::build_context;
use history::History;

/// Sampling temperature for every completion; kept low for factual answers.
pub const TEMPERATURE: f32 = 0.2;

/// One dialogue about one dataset.
///
/// The briefing is computed once at construction and never refreshed; build a
/// new session when the dataset changes. `ask` takes `&mut self`, so calls on
/// a session are serialized by the borrow checker.
pub struct DataChatSession {
    context: String,
    backend: BackendConfig,
    history: History,
    client: Arc<dyn LlmClient>,
    created_at: DateTime<Utc>,
}

impl DataChatSession {
    pub fn new(dataset: &dyn DatasetView, backend: BackendConfig, client: Arc<dyn LlmClient>) -> Self {
        let context = build_context(dataset);

        info!("Starting data chat session with {}", backend);
        debug!("Session context:\n{}", context);

        Self {
            context,
            backend,
            history: History::new(),
            client,
            created_at: Utc::now(),
        }
    }

    /// Send one user turn and return the model's answer.
    ///
    /// History is only extended when the call succeeds; a failure leaves the
    /// session exactly as it was.
    pub async fn ask(&mut self, user_message: &str) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(self.context.as_str()));
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(user_message));

        let request = CompletionRequest {
            backend: self.backend.clone(),
            messages,
            temperature: TEMPERATURE,
        };

        debug!("Asking {} with {} history messages", self.backend.model, self.history.len());

        match self.client.complete(request).await {
            Ok(answer) => {
                self.history.push_exchange(user_message, &answer);
                Ok(answer)
            }
            Err(e) => {
                warn!("Completion failed ({}): {}", e.category(), e);
                Err(e)
            }
        }
    }

    /// Like [`ask`](Self::ask), but failures come back as marked chat text.
    pub async fn reply(&mut self, user_message: &str) -> String {
        match self.ask(user_message).await {
            Ok(answer) => answer,
            Err(e) => e.reply_text(),
        }
    }

    /// Forget the conversation; the briefing and backend stay as they are.
    pub fn reset(&mut self) {
        if !self.history.is_empty() {
            info!("Clearing {} history messages", self.history.len());
        }
        self.history.clear();
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn backend(&self) -> &BackendConfig {
        &self.backend
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
