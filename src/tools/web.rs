//! Live web search tool.
//!
//! Backs the availability/price/schedule questions the model cannot answer
//! from its own knowledge. Uses the DuckDuckGo HTML endpoint, which needs
//! no API key.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolContext};

/// Hard cap on returned results, regardless of what the model asks for.
const MAX_RESULTS: usize = 5;

/// Search the web for current travel information.
pub struct WebSearch {
    client: reqwest::Client,
}

/// One ranked search hit.
struct SearchHit {
    title: String,
    snippet: String,
    url: String,
}

impl WebSearch {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; TripAgent/1.0)")
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for WebSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current travel information: room availability, ticket prices, opening hours, bus/train/flight schedules, weather. Returns ranked results with titles and snippets."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query, e.g. 'giá vé Đại Nội Huế 2026'"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 5, capped at 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> anyhow::Result<String> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'query' argument"))?;
        let num_results = args["num_results"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(MAX_RESULTS)
            .min(MAX_RESULTS);

        tracing::info!(query, "web search");

        let encoded_query = urlencoding::encode(query);
        let url = format!("https://html.duckduckgo.com/html/?q={}", encoded_query);

        let response = self.client.get(&url).send().await?;
        let html = response.text().await?;

        let hits = extract_ddg_results(&html, num_results);

        if hits.is_empty() {
            return Ok(format!("No results found for: {}", query));
        }

        let formatted: Vec<String> = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                format!(
                    "{}. {}\n{}\nURL: {}",
                    i + 1,
                    hit.title,
                    hit.snippet,
                    hit.url
                )
            })
            .collect();

        Ok(formatted.join("\n\n"))
    }
}

/// Extract ranked results from DuckDuckGo HTML.
fn extract_ddg_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    for chunk in html.split("class=\"result__body\"").skip(1) {
        if hits.len() >= limit {
            break;
        }

        let title = chunk
            .split("class=\"result__a\"")
            .nth(1)
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .unwrap_or("");

        let snippet = chunk
            .split("class=\"result__snippet\"")
            .nth(1)
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .unwrap_or("");

        let url = chunk
            .split("class=\"result__url\"")
            .nth(1)
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .map(|s| s.trim())
            .unwrap_or("");

        if !title.is_empty() {
            hits.push(SearchHit {
                title: html_decode(title),
                snippet: html_decode(snippet),
                url: url.to_string(),
            });
        }
    }

    hits
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
}
