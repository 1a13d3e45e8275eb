use std::env;
use std::fmt;

/// Environment variable holding the hosted service credential.
pub const HOSTED_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

pub const HOSTED_MODEL: &str = "mistralai/mistral-7b-instruct:free";
pub const HOSTED_BASE_URL: &str = "https://openrouter.ai/api/v1";

pub const LOCAL_MODEL: &str = "mistral";
pub const LOCAL_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// OpenAI-compatible hosted inference service.
    Hosted,
    /// Ollama server on the loopback interface.
    Local,
}

/// The model, endpoint and credential a session talks to.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
}

impl BackendConfig {
    /// Pick the backend from the hosted credential alone.
    ///
    /// A present, non-blank credential selects the hosted service; anything
    /// else falls back to the local server.
    pub fn select(api_key: Option<String>) -> Self {
        match api_key.filter(|key| !key.trim().is_empty()) {
            Some(key) => Self::hosted(key),
            None => Self::local(),
        }
    }

    /// Resolve the backend from the process environment.
    pub fn from_env() -> Self {
        Self::select(env::var(HOSTED_API_KEY_ENV).ok())
    }

    pub fn hosted(api_key: impl Into<String>) -> Self {
        Self {
            kind: BackendKind::Hosted,
            model: HOSTED_MODEL.to_string(),
            base_url: HOSTED_BASE_URL.to_string(),
            api_key: Some(api_key.into()),
        }
    }

    pub fn local() -> Self {
        Self {
            kind: BackendKind::Local,
            model: LOCAL_MODEL.to_string(),
            base_url: LOCAL_BASE_URL.to_string(),
            api_key: None,
        }
    }

    /// Point the backend at another server, keeping model and credential.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// Hand-written so the credential never ends up in logs.
impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl fmt::Display for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            BackendKind::Hosted => "hosted",
            BackendKind::Local => "local",
        };
        write!(f, "{} model '{}' at {}", kind, self.model, self.base_url)
    }
}
