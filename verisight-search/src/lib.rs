//! Web search used to ground claim verification.
//!
//! - [`SearchProvider`]: the seam orchestrators depend on
//! - [`tavily::TavilyClient`]: Tavily Search API client
//! - [`SearchContext`]: the provider's raw answer, kept opaque
//!
//! The context is embedded verbatim into an LLM prompt and is never parsed
//! structurally here.

pub mod tavily;

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

pub use tavily::TavilyClient;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Http(#[from] verisight_http::HttpError),
    #[error("search configuration error: {0}")]
    Config(String),
}

/// How much effort the provider should spend per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Basic,
    #[default]
    Advanced,
}

impl SearchDepth {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        }
    }
}

/// Opaque blob of retrieved passages.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchContext(serde_json::Value);

impl SearchContext {
    pub fn new(raw: serde_json::Value) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.0
    }
}

impl fmt::Display for SearchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one query at the provider's deepest configured depth.
    async fn search(&self, query: &str) -> Result<SearchContext, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn context_renders_compact_json() {
        let ctx = SearchContext::new(json!({"results": [{"title": "a"}]}));
        assert_eq!(ctx.to_string(), r#"{"results":[{"title":"a"}]}"#);
    }

    #[test]
    fn depth_defaults_to_advanced() {
        assert_eq!(SearchDepth::default().as_str(), "advanced");
        let d: SearchDepth = serde_json::from_str("\"basic\"").unwrap();
        assert_eq!(d, SearchDepth::Basic);
    }
}
