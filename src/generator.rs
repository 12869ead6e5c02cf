//! Article drafting through a generative-AI service.
//!
//! The rest of the application only sees the [`ArticleGenerator`] trait, so
//! handlers and tests can swap the HTTP-backed [`OpenAiGenerator`] for a stub.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::config::AiConfig;
use crate::db::Trend;

const SYSTEM_PROMPT: &str = "You are a news writer for a blog about trending topics. \
Reply with a JSON object with the keys title, content, summary, meta_description \
and keywords (an array of strings). content is markdown.";

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("no AI API key configured")]
    MissingApiKey,
    #[error("AI request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("AI service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("AI response contained no message")]
    EmptyResponse,
    #[error("AI response was not a valid article: {0}")]
    InvalidArticle(#[from] serde_json::Error),
    #[error("AI response is missing a title")]
    MissingTitle,
}

/// Fields produced for a new article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[async_trait]
pub trait ArticleGenerator: Send + Sync {
    async fn generate(&self, trend: &Trend) -> Result<GeneratedArticle, GeneratorError>;
}

/// User prompt describing one trend.
pub fn trend_prompt(trend: &Trend) -> String {
    let mut prompt = format!(
        "Write an article about the trending topic \"{}\".\nApproximate searches: {}\nTrending since: {}\n",
        trend.title,
        trend.approx_traffic,
        trend.publication_date.to_rfc3339()
    );
    if !trend.news_items.is_empty() {
        prompt.push_str("Related news:\n");
        prompt.push_str(&trend.news_items);
        prompt.push('\n');
    }
    prompt
}

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct OpenAiGenerator {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(config: &AiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent("TrendPress/1.0")
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ArticleGenerator for OpenAiGenerator {
    async fn generate(&self, trend: &Trend) -> Result<GeneratedArticle, GeneratorError> {
        if self.api_key.is_empty() {
            return Err(GeneratorError::MissingApiKey);
        }

        info!("Generating article for trend '{}'", trend.title);

        let body = json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": trend_prompt(trend) },
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("AI service returned {} for '{}'", status, trend.title);
            return Err(GeneratorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GeneratorError::EmptyResponse)?;

        let article: GeneratedArticle = serde_json::from_str(&content)?;
        if article.title.trim().is_empty() {
            return Err(GeneratorError::MissingTitle);
        }
        Ok(article)
    }
}
