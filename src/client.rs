use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct AskRequest<'a> {
    question: &'a str,
}

/// Envelope returned by the `/ask` endpoint.
///
/// Either `error` or `answer` is present (or neither, which the caller
/// surfaces as "no result"). The remaining fields are metadata the backend
/// attaches about how the answer was produced.
#[derive(Debug, Clone, Deserialize)]
pub struct AskResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub answer: Option<AnswerField>,
    #[serde(default)]
    pub sql_used: Option<String>,
    #[serde(default)]
    pub tables_used: Option<Vec<String>>,
    #[serde(default)]
    pub source: Option<String>,
}

/// The `answer` field is usually a tagged object, but the backend's cache and
/// rule-engine paths return it as a bare string. Anything else is an
/// unrecognized shape the UI reports without failing the whole parse.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AnswerField {
    Tagged(Answer),
    Plain(String),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Answer {
    Text {
        message: String,
    },
    Table {
        columns: Vec<String>,
        #[serde(default)]
        rows: Vec<Vec<serde_json::Value>>,
        #[serde(default)]
        insight: Option<String>,
    },
    /// Unrecognized `type` value. Kept soft so a newer backend doesn't break
    /// the client.
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Clone)]
pub struct AskClient {
    client: Client,
    base_url: String,
}

impl AskClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit one question and parse the reply envelope.
    ///
    /// The body is parsed as JSON whatever the HTTP status: the backend
    /// reports application failures through the `error` field, not status
    /// codes.
    pub async fn ask(&self, question: &str) -> Result<AskResponse> {
        let url = format!("{}/ask", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&AskRequest { question })
            .send()
            .await?;

        let envelope: AskResponse = response.json().await?;
        Ok(envelope)
    }

    /// Probe `GET /`, which answers `{"status": "running"}` when the service
    /// is up. Uses a short timeout so startup doesn't hang on a dead host.
    pub async fn health(&self) -> bool {
        match self
            .client
            .get(format!("{}/", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(response) => response
                .json::<HealthResponse>()
                .await
                .map(|h| h.status == "running")
                .unwrap_or(false),
            Err(_) => false,
        }
    }
}

/// True when the failure was the configured request timeout rather than a
/// generic transport problem.
pub fn is_timeout(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .map_or(false, reqwest::Error::is_timeout)
    })
}
