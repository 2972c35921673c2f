//! Summarization collaborator with a local heuristic fallback.
//!
//! The external provider is pluggable: it accepts a prompt and a timeout and
//! returns `{summary, tags}` or fails. Any provider failure (disabled,
//! misconfigured, transport error, timeout, malformed reply) falls back to a
//! local heuristic; it is never surfaced as a request failure. Provider
//! settings are an explicit configuration value passed into the constructor,
//! never ambient state.

use crate::error::{DualNativeError, Result};
use crate::model::MachineRepresentation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Words ignored by the heuristic tag extractor.
const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "among", "because", "being", "between", "could", "events",
    "first", "from", "have", "into", "other", "should", "that", "their", "there", "these", "this",
    "those", "through", "where", "which", "while", "will", "with", "would", "your",
];

/// How many words the heuristic summary keeps.
const SUMMARY_WORDS: usize = 120;
/// Maximum prompt length sent to a provider, in characters.
const PROMPT_TEXT_LIMIT: usize = 6000;

/// Configuration for the summarization provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestConfig {
    /// Whether the external provider may be called at all. Disabled is a
    /// normal input, not an error.
    pub enabled: bool,
    /// Endpoint shape: `openai` for chat-completions, anything else for the
    /// generic `{prompt, model}` endpoint.
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    /// Provider call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    15
}

/// `{summary, tags}` as returned by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// The full suggestion payload served to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub summary: String,
    pub tags: Vec<String>,
    pub headings: Vec<String>,
    /// `heuristic`, or the external provider's name.
    pub provider: String,
}

/// A pluggable summarization backend.
#[async_trait]
pub trait SuggestProvider: Send + Sync {
    /// Human-readable provider name, reported in responses.
    fn name(&self) -> &str;

    /// Produce `{summary, tags}` for a prompt, bounded by `timeout`.
    async fn suggest(&self, prompt: &str, timeout: Duration) -> Result<Suggestion>;
}

/// Generic HTTP provider: `POST {prompt, model}` -> `{summary, tags}`.
pub struct HttpSuggestProvider {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl HttpSuggestProvider {
    pub fn new(api_url: &str, api_key: &str, model: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(DualNativeError::Request)?;
        Ok(HttpSuggestProvider {
            http,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl SuggestProvider for HttpSuggestProvider {
    fn name(&self) -> &str {
        "generic"
    }

    async fn suggest(&self, prompt: &str, timeout: Duration) -> Result<Suggestion> {
        let body = serde_json::json!({ "prompt": prompt, "model": self.model });
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DualNativeError::Timeout
                } else {
                    DualNativeError::Upstream(e.to_string())
                }
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(DualNativeError::Upstream(format!(
                "provider returned {status}"
            )));
        }
        let suggestion: Suggestion = response
            .json()
            .await
            .map_err(|e| DualNativeError::Upstream(format!("malformed provider reply: {e}")))?;
        Ok(suggestion)
    }
}

/// OpenAI-shaped provider: chat-completions request, with the suggestion
/// JSON embedded in the first choice's message content.
pub struct OpenAiSuggestProvider {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiSuggestProvider {
    pub fn new(api_url: &str, api_key: &str, model: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(DualNativeError::Request)?;
        Ok(OpenAiSuggestProvider {
            http,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl SuggestProvider for OpenAiSuggestProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn suggest(&self, prompt: &str, timeout: Duration) -> Result<Suggestion> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a helpful assistant. Return only compact JSON.",
                },
                { "role": "user", "content": prompt },
            ],
            "temperature": 0.2,
            "max_tokens": 300,
        });
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DualNativeError::Timeout
                } else {
                    DualNativeError::Upstream(e.to_string())
                }
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(DualNativeError::Upstream(format!(
                "provider returned {status}"
            )));
        }
        let reply: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DualNativeError::Upstream(format!("malformed provider reply: {e}")))?;
        parse_chat_reply(&reply)
            .ok_or_else(|| DualNativeError::Upstream("no suggestion in provider reply".into()))
    }
}

/// Extract `{summary, tags}` from a chat-completions reply's first choice.
fn parse_chat_reply(reply: &serde_json::Value) -> Option<Suggestion> {
    let content = reply["choices"][0]["message"]["content"].as_str()?;
    serde_json::from_str(content).ok()
}

/// Suggestion engine: external provider when configured, heuristic otherwise.
pub struct Suggester {
    provider: Option<Arc<dyn SuggestProvider>>,
    timeout: Duration,
}

impl Suggester {
    /// Build from explicit configuration. A disabled or incomplete config
    /// yields a heuristic-only engine.
    #[must_use]
    pub fn from_config(config: &SuggestConfig) -> Self {
        let provider: Option<Arc<dyn SuggestProvider>> =
            if config.enabled && !config.api_url.is_empty() && !config.api_key.is_empty() {
                let built: Result<Arc<dyn SuggestProvider>> = if config.provider == "openai" {
                    OpenAiSuggestProvider::new(&config.api_url, &config.api_key, &config.model)
                        .map(|p| Arc::new(p) as Arc<dyn SuggestProvider>)
                } else {
                    HttpSuggestProvider::new(&config.api_url, &config.api_key, &config.model)
                        .map(|p| Arc::new(p) as Arc<dyn SuggestProvider>)
                };
                match built {
                    Ok(p) => Some(p),
                    Err(err) => {
                        tracing::warn!("suggest provider unavailable: {err}");
                        None
                    }
                }
            } else {
                None
            };
        Suggester {
            provider,
            timeout: Duration::from_secs(config.timeout_secs.max(5)),
        }
    }

    /// Heuristic-only engine, mainly for tests.
    #[must_use]
    pub fn heuristic_only() -> Self {
        Suggester {
            provider: None,
            timeout: Duration::from_secs(default_timeout_secs()),
        }
    }

    /// Produce a suggestion for an MR. Never fails: provider errors degrade
    /// to the heuristic.
    pub async fn suggest(&self, mr: &MachineRepresentation) -> SuggestResponse {
        let headings: Vec<String> = mr.heading_texts().iter().map(|s| s.to_string()).collect();
        if let Some(provider) = &self.provider {
            let prompt = build_prompt(mr);
            match provider.suggest(&prompt, self.timeout).await {
                Ok(suggestion) => {
                    return SuggestResponse {
                        summary: suggestion.summary,
                        tags: suggestion.tags,
                        headings,
                        provider: provider.name().to_string(),
                    };
                }
                Err(err) => {
                    tracing::warn!("suggest provider failed, using heuristic: {err}");
                }
            }
        }
        let (summary, tags) = heuristic(&mr.core_content_text);
        SuggestResponse {
            summary,
            tags,
            headings,
            provider: "heuristic".to_string(),
        }
    }
}

/// Prompt for the external provider: title, truncated core text, headings.
fn build_prompt(mr: &MachineRepresentation) -> String {
    let text: String = mr.core_content_text.chars().take(PROMPT_TEXT_LIMIT).collect();
    let mut prompt = format!("Title: {}\n\nContent (truncated):\n{}\n", mr.title, text);
    let headings = mr.heading_texts();
    if !headings.is_empty() {
        prompt.push_str("\nHeadings:\n");
        for heading in headings {
            prompt.push_str("- ");
            prompt.push_str(heading);
            prompt.push('\n');
        }
    }
    prompt.push_str(
        "\nTask: Produce concise JSON with keys: summary (<= 120 words), \
         tags (array of up to 5 concise lowercase tags). Output only JSON.",
    );
    prompt
}

/// Local fallback: leading words as summary, frequent long words as tags.
fn heuristic(core_text: &str) -> (String, Vec<String>) {
    let words: Vec<&str> = core_text.split_whitespace().collect();
    let summary = words
        .iter()
        .take(SUMMARY_WORDS)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    let mut freq: HashMap<String, usize> = HashMap::new();
    for word in &words {
        let cleaned: String = word
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if cleaned.len() < 5 || STOPWORDS.contains(&cleaned.as_str()) {
            continue;
        }
        *freq.entry(cleaned).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = freq.into_iter().collect();
    // Count desc, then alphabetical, so tag order is deterministic.
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let tags = ranked.into_iter().take(5).map(|(w, _)| w).collect();
    (summary, tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Author, ContentBlock, Links};

    fn mr(core: &str, blocks: Vec<ContentBlock>) -> MachineRepresentation {
        MachineRepresentation {
            rid: 1,
            title: "Report".into(),
            status: "draft".into(),
            modified: "2026-01-01T00:00:00Z".parse().unwrap(),
            published: "2026-01-01T00:00:00Z".parse().unwrap(),
            author: Author {
                id: 1,
                name: "Ana".into(),
                url: String::new(),
            },
            image: None,
            categories: vec![],
            tags: vec![],
            word_count: 0,
            core_content_text: core.into(),
            blocks,
            links: Links {
                human_url: String::new(),
                api_url: String::new(),
                md_url: String::new(),
            },
            cid: None,
        }
    }

    #[tokio::test]
    async fn heuristic_summary_and_tags() {
        let suggester = Suggester::heuristic_only();
        let text = "kubernetes clusters schedule workloads kubernetes clusters scale services";
        let response = suggester.suggest(&mr(text, vec![])).await;
        assert_eq!(response.provider, "heuristic");
        assert!(response.summary.starts_with("kubernetes clusters"));
        assert_eq!(response.tags[0], "clusters");
        assert_eq!(response.tags[1], "kubernetes");
    }

    #[tokio::test]
    async fn headings_come_from_blocks() {
        let suggester = Suggester::heuristic_only();
        let blocks = vec![
            ContentBlock::Heading {
                level: 2,
                text: "Background".into(),
            },
            ContentBlock::Paragraph { text: "p".into() },
            ContentBlock::Heading {
                level: 3,
                text: "Results".into(),
            },
        ];
        let response = suggester.suggest(&mr("p", blocks)).await;
        assert_eq!(response.headings, vec!["Background", "Results"]);
    }

    #[test]
    fn heuristic_skips_short_and_stop_words() {
        let (_, tags) = heuristic("that that that apple apple tiny to a");
        assert_eq!(tags, vec!["apple"]);
    }

    #[test]
    fn disabled_config_yields_no_provider() {
        let suggester = Suggester::from_config(&SuggestConfig::default());
        assert!(suggester.provider.is_none());
    }

    #[test]
    fn provider_setting_selects_the_endpoint_shape() {
        let config = |provider: &str| SuggestConfig {
            enabled: true,
            provider: provider.into(),
            api_url: "http://llm/v1".into(),
            api_key: "k".into(),
            model: "m".into(),
            timeout_secs: 5,
        };
        let openai = Suggester::from_config(&config("openai"));
        assert_eq!(openai.provider.as_ref().unwrap().name(), "openai");
        let generic = Suggester::from_config(&config(""));
        assert_eq!(generic.provider.as_ref().unwrap().name(), "generic");
    }

    #[test]
    fn chat_reply_content_is_parsed_as_suggestion() {
        let reply = serde_json::json!({
            "choices": [{
                "message": {
                    "content": "{\"summary\": \"short\", \"tags\": [\"alpha\", \"beta\"]}"
                }
            }]
        });
        let suggestion = parse_chat_reply(&reply).unwrap();
        assert_eq!(suggestion.summary, "short");
        assert_eq!(suggestion.tags, vec!["alpha", "beta"]);
    }

    #[test]
    fn malformed_chat_replies_yield_nothing() {
        assert!(parse_chat_reply(&serde_json::json!({"choices": []})).is_none());
        assert!(parse_chat_reply(&serde_json::json!({
            "choices": [{"message": {"content": "not json"}}]
        }))
        .is_none());
        // Content without a summary is not a suggestion.
        assert!(parse_chat_reply(&serde_json::json!({
            "choices": [{"message": {"content": "{\"tags\": []}"}}]
        }))
        .is_none());
    }

    #[test]
    fn prompt_contains_title_and_headings() {
        let prompt = build_prompt(&mr(
            "body text",
            vec![ContentBlock::Heading {
                level: 2,
                text: "Scope".into(),
            }],
        ));
        assert!(prompt.contains("Title: Report"));
        assert!(prompt.contains("- Scope"));
        assert!(prompt.contains("Output only JSON"));
    }
}
