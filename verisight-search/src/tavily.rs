use crate::{SearchContext, SearchDepth, SearchError, SearchProvider};
use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};
use verisight_http::{HttpClient, RequestOpts};

pub const TAVILY_API_BASE: &str = "https://api.tavily.com/";

/// Minimal client for the Tavily Search API.
#[derive(Clone)]
pub struct TavilyClient {
    http: HttpClient,
    api_key: String,
    depth: SearchDepth,
    timeout: Duration,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    search_depth: &'static str,
}

impl TavilyClient {
    pub fn new(api_key: String) -> Result<Self, SearchError> {
        Self::with_base(TAVILY_API_BASE, api_key)
    }

    pub fn with_base(base: &str, api_key: String) -> Result<Self, SearchError> {
        if api_key.trim().is_empty() {
            return Err(SearchError::Config("Tavily API key is empty".into()));
        }
        let http = HttpClient::new(base).map_err(|e| SearchError::Config(e.to_string()))?;
        Ok(Self {
            http,
            api_key,
            depth: SearchDepth::Advanced,
            timeout: Duration::from_secs(30),
        })
    }

    pub fn with_depth(mut self, depth: SearchDepth) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(&self, query: &str) -> Result<SearchContext, SearchError> {
        let query_snippet: String = query.chars().take(160).collect();
        let started = Instant::now();
        tracing::info!(
            target: "search.tavily",
            query = %query_snippet,
            depth = self.depth.as_str(),
            "tavily.search.start"
        );

        let req = SearchRequest {
            query,
            search_depth: self.depth.as_str(),
        };
        let result = self
            .http
            .post_json_opts::<_, serde_json::Value>(
                "search",
                &req,
                RequestOpts {
                    bearer: Some(&self.api_key),
                    timeout: Some(self.timeout),
                    retries: Some(1),
                    ..Default::default()
                },
            )
            .await;

        match result {
            Ok(raw) => {
                tracing::info!(
                    target: "search.tavily",
                    query = %query_snippet,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    result_count = raw.get("results").and_then(|r| r.as_array()).map(|r| r.len()),
                    "tavily.search.success"
                );
                Ok(SearchContext::new(raw))
            }
            Err(e) => {
                tracing::warn!(
                    target: "search.tavily",
                    query = %query_snippet,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "tavily.search.error"
                );
                Err(SearchError::Http(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_posts_query_with_advanced_depth() {
        let server = MockServer::start().await;
        let answer = json!({"query": "the moon is cheese", "results": [{"title": "NASA", "content": "rock"}]});
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("authorization", "Bearer tvly-test"))
            .and(body_json(json!({"query": "the moon is cheese", "search_depth": "advanced"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let client = TavilyClient::with_base(&server.uri(), "tvly-test".into()).unwrap();
        let ctx = client.search("the moon is cheese").await.unwrap();
        assert_eq!(ctx.raw(), &answer);
    }

    #[tokio::test]
    async fn provider_errors_are_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": {"error": "Unauthorized"}})))
            .mount(&server)
            .await;

        let client = TavilyClient::with_base(&server.uri(), "tvly-bad".into()).unwrap();
        let err = client.search("anything").await.unwrap_err();
        assert!(matches!(err, SearchError::Http(_)));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            TavilyClient::new("  ".into()),
            Err(SearchError::Config(_))
        ));
    }
}
