//! Web search tool: Google Custom Search when credentials are
//! configured, DuckDuckGo Instant Answer otherwise. Network failures
//! degrade to an empty result list so the model can answer without.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::warn;

use confide_core::error::ToolError;
use confide_core::tool::{Tool, ToolContext};

const GOOGLE_CSE_URL: &str = "https://www.googleapis.com/customsearch/v1";
const DDG_URL: &str = "https://api.duckduckgo.com/";

/// Google Custom Search credentials.
#[derive(Debug, Clone)]
pub struct SearchCredentials {
    pub api_key: String,
    pub cx: String,
}

pub struct WebSearchTool {
    client: reqwest::Client,
    credentials: Option<SearchCredentials>,
}

impl WebSearchTool {
    pub fn new(credentials: Option<SearchCredentials>) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
        }
    }

    async fn google_cse(&self, query: &str, num: usize) -> Vec<Value> {
        let Some(creds) = &self.credentials else {
            return Vec::new();
        };
        let response = self
            .client
            .get(GOOGLE_CSE_URL)
            .query(&[
                ("key", creds.api_key.as_str()),
                ("cx", creds.cx.as_str()),
                ("q", query),
                ("num", &num.to_string()),
            ])
            .send()
            .await;
        match response {
            Ok(resp) => match resp.json::<Value>().await {
                Ok(body) => parse_cse_items(&body),
                Err(e) => {
                    warn!(error = %e, "Malformed CSE response");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(error = %e, "CSE request failed");
                Vec::new()
            }
        }
    }

    async fn ddg_instant(&self, query: &str) -> Vec<Value> {
        let response = self
            .client
            .get(DDG_URL)
            .query(&[("q", query), ("format", "json"), ("no_redirect", "1"), ("no_html", "1")])
            .send()
            .await;
        match response {
            Ok(resp) => match resp.json::<Value>().await {
                Ok(body) => parse_ddg_answer(&body),
                Err(e) => {
                    warn!(error = %e, "Malformed DDG response");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(error = %e, "DDG request failed");
                Vec::new()
            }
        }
    }
}

/// Pull title/link/snippet rows out of a Custom Search response body.
pub fn parse_cse_items(body: &Value) -> Vec<Value> {
    body["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    json!({
                        "title": item["title"],
                        "link": item["link"],
                        "snippet": item["snippet"],
                        "displayLink": item["displayLink"],
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Convert a DuckDuckGo Instant Answer body into result rows: the
/// abstract first, then up to five related topics.
pub fn parse_ddg_answer(body: &Value) -> Vec<Value> {
    let mut out = Vec::new();
    if body["AbstractText"].as_str().is_some_and(|s| !s.is_empty()) {
        out.push(json!({
            "title": body["Heading"],
            "link": body["AbstractURL"],
            "snippet": body["AbstractText"],
        }));
    }
    if let Some(topics) = body["RelatedTopics"].as_array() {
        for topic in topics.iter().take(5) {
            if topic["Text"].as_str().is_some_and(|s| !s.is_empty()) {
                out.push(json!({
                    "title": topic["Text"],
                    "link": topic["FirstURL"],
                    "snippet": topic["Text"],
                }));
            }
        }
    }
    out
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Perform a web search and return top results (Google CSE if configured, else DuckDuckGo Instant)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "num": {"type": "integer"}
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<serde_json::Value, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let num = arguments["num"].as_u64().unwrap_or(5).clamp(1, 10) as usize;

        let mut results = self.google_cse(query, num).await;
        if results.is_empty() {
            results = self.ddg_instant(query).await;
        }
        results.truncate(num);
        Ok(json!({"results": results}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cse_items_map_to_result_rows() {
        let body = json!({
            "items": [
                {"title": "A", "link": "https://a", "snippet": "sa", "displayLink": "a"},
                {"title": "B", "link": "https://b", "snippet": "sb", "displayLink": "b"}
            ]
        });
        let rows = parse_cse_items(&body);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["title"], "A");
        assert_eq!(rows[1]["link"], "https://b");
    }

    #[test]
    fn cse_without_items_is_empty() {
        assert!(parse_cse_items(&json!({})).is_empty());
    }

    #[test]
    fn ddg_abstract_leads_and_topics_cap_at_five() {
        let topics: Vec<Value> = (0..8)
            .map(|i| json!({"Text": format!("t{i}"), "FirstURL": format!("https://t{i}")}))
            .collect();
        let body = json!({
            "Heading": "Rust",
            "AbstractText": "A systems language.",
            "AbstractURL": "https://rust-lang.org",
            "RelatedTopics": topics,
        });
        let rows = parse_ddg_answer(&body);
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0]["title"], "Rust");
    }

    #[tokio::test]
    async fn missing_query_is_invalid_arguments() {
        let tool = WebSearchTool::new(None);
        let err = tool
            .execute(json!({}), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
