//! SerpAPI web search.

#![cfg_attr(not(feature = "web-search"), allow(dead_code))]

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

use super::{SearchAngle, SearchProvider};
use crate::config::WebSearchConfig;
use crate::providers::{ApiCredential, ProviderError};

/// Environment variable for the SerpAPI key.
pub const SERPAPI_KEY_ENV: &str = "SERPAPI_KEY";

const MAX_RELATED: usize = 3;
const MAX_NEWS: usize = 3;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    answer_box: Option<AnswerBox>,
    knowledge_graph: Option<KnowledgeGraph>,
    organic_results: Vec<OrganicResult>,
    related_questions: Vec<RelatedQuestion>,
    news_results: Vec<NewsResult>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnswerBox {
    answer: Option<String>,
    snippet: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KnowledgeGraph {
    title: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrganicResult {
    title: String,
    snippet: String,
    link: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RelatedQuestion {
    question: String,
    snippet: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NewsResult {
    title: String,
    snippet: String,
    date: String,
    /// A plain name or an object with a `name` field
    source: Option<JsonValue>,
}

impl NewsResult {
    fn source_name(&self) -> &str {
        match &self.source {
            Some(JsonValue::String(s)) => s.as_str(),
            Some(JsonValue::Object(map)) => map.get("name").and_then(JsonValue::as_str).unwrap_or(""),
            _ => "",
        }
    }
}

/// SerpAPI-backed search provider.
#[derive(Debug, Clone)]
pub struct SerpApiSearch {
    base_url: String,
    api_key: Option<ApiCredential>,
    timeout: Duration,
    max_organic: usize,
}

impl SerpApiSearch {
    /// Build from config. Without a real key (config or `SERPAPI_KEY`) the
    /// provider reports itself as not configured.
    pub fn from_config(config: &WebSearchConfig) -> Self {
        let configured = config.api_key.as_ref().map(ApiCredential::expose);
        Self {
            base_url: config.base_url.clone(),
            api_key: ApiCredential::resolve_optional(configured, SERPAPI_KEY_ENV, "SerpAPI key"),
            timeout: config.timeout,
            max_organic: config.max_organic_results,
        }
    }
}

#[async_trait]
impl SearchProvider for SerpApiSearch {
    fn is_configured(&self) -> bool {
        cfg!(feature = "web-search") && self.api_key.is_some()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    #[cfg(feature = "web-search")]
    async fn search(&self, query: &str, angle: SearchAngle) -> Result<String, ProviderError> {
        use crate::providers::http;

        let key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::NotConfigured("SerpAPI key not set".to_string()))?;

        let response = http::client()?
            .get(&self.base_url)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("api_key", key.expose()),
                ("num", "10"),
                ("hl", "en"),
                ("gl", "us"),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| http::transport_error(e, self.timeout))?;

        let body: SearchResponse = http::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        if let Some(error) = body.error.as_deref().filter(|e| !e.is_empty()) {
            return Err(ProviderError::ApiError {
                status: 200,
                message: error.to_string(),
            });
        }

        let text = render(&body, angle, self.max_organic);
        if text.is_empty() {
            Err(ProviderError::NoMatch(query.to_string()))
        } else {
            Ok(text)
        }
    }

    #[cfg(not(feature = "web-search"))]
    async fn search(&self, _query: &str, _angle: SearchAngle) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured(
            "web search requires the 'web-search' feature".to_string(),
        ))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Flatten results: direct answer, authoritative summary, ranked results,
/// related questions and, for the recency angle, news.
fn render(body: &SearchResponse, angle: SearchAngle, max_organic: usize) -> String {
    let mut lines = Vec::new();

    if let Some(answer) = body.answer_box.as_ref().and_then(|a| {
        non_empty(a.answer.as_deref()).or_else(|| non_empty(a.snippet.as_deref()))
    }) {
        lines.push(format!("[DIRECT ANSWER] {}", answer));
    }

    if let Some(kg) = &body.knowledge_graph {
        if let (Some(title), Some(description)) =
            (non_empty(kg.title.as_deref()), non_empty(kg.description.as_deref()))
        {
            lines.push(format!("[AUTHORITATIVE] {}: {}", title, description));
        }
    }

    for (i, result) in body.organic_results.iter().take(max_organic).enumerate() {
        lines.push(format!(
            "[{}] {}\n   Summary: {}\n   Source: {}",
            i + 1,
            result.title,
            result.snippet,
            result.link
        ));
    }

    for related in body
        .related_questions
        .iter()
        .filter(|r| !r.question.is_empty() && !r.snippet.is_empty())
        .take(MAX_RELATED)
    {
        lines.push(format!("[RELATED] Q: {} A: {}", related.question, related.snippet));
    }

    if angle == SearchAngle::Recent {
        for news in body.news_results.iter().take(MAX_NEWS) {
            lines.push(format!(
                "[NEWS {}] {}: {} - {}",
                news.date,
                news.source_name(),
                news.title,
                news.snippet
            ));
        }
    }

    lines.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> SearchResponse {
        serde_json::from_value(serde_json::json!({
            "answer_box": {"snippet": "Processed meat is a Group 1 carcinogen."},
            "knowledge_graph": {"title": "Bacon", "description": "Cured pork."},
            "organic_results": [
                {"title": "IARC Monographs", "snippet": "Processed meat...", "link": "https://iarc.who.int"},
                {"title": "Second", "snippet": "More", "link": "https://example.org"}
            ],
            "related_questions": [
                {"question": "Is bacon carcinogenic?", "snippet": "Yes, Group 1."},
                {"question": "No answer", "snippet": ""}
            ],
            "news_results": [
                {"title": "New study", "snippet": "Findings", "date": "2 days ago", "source": {"name": "Reuters"}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_render_order() {
        let text = render(&response(), SearchAngle::Health, 8);
        let answer = text.find("[DIRECT ANSWER] Processed meat").unwrap();
        let kg = text.find("[AUTHORITATIVE] Bacon: Cured pork.").unwrap();
        let first = text.find("[1] IARC Monographs\n   Summary: Processed meat...\n   Source: https://iarc.who.int").unwrap();
        let related = text.find("[RELATED] Q: Is bacon carcinogenic? A: Yes, Group 1.").unwrap();
        assert!(answer < kg && kg < first && first < related);
        assert!(!text.contains("No answer"));
        assert!(!text.contains("[NEWS"));
    }

    #[test]
    fn test_news_only_for_recent_angle() {
        let text = render(&response(), SearchAngle::Recent, 8);
        assert!(text.contains("[NEWS 2 days ago] Reuters: New study - Findings"));
    }

    #[test]
    fn test_organic_limit() {
        let text = render(&response(), SearchAngle::Health, 1);
        assert!(text.contains("[1] IARC"));
        assert!(!text.contains("[2] Second"));
    }

    #[test]
    fn test_empty_response_renders_nothing() {
        assert!(render(&SearchResponse::default(), SearchAngle::Health, 8).is_empty());
    }

    #[test]
    fn test_placeholder_key_is_not_configured() {
        let config = WebSearchConfig {
            api_key: Some(ApiCredential::new(
                "your_serpapi_key_here",
                crate::providers::CredentialSource::Config,
                "SerpAPI key",
            )),
            ..Default::default()
        };
        std::env::remove_var(SERPAPI_KEY_ENV);
        assert!(!SerpApiSearch::from_config(&config).is_configured());
    }
}
