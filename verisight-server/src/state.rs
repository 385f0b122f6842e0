use crate::app::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use verisight_config::VerisightConfig;
use verisight_engine::{ClaimVerifier, MediaAnalyzer, ModelChain};
use verisight_forensics::{ClassificationGateway, FfmpegDecoder, FrameExtractor};
use verisight_llm::ensure_llm_ready;
use verisight_search::TavilyClient;

/// Build every upstream client once; handlers only read this.
pub async fn build_state(cfg: &VerisightConfig) -> Result<AppState> {
    let deadline = cfg.server.request_deadline();

    let gateway = ClassificationGateway::new(
        &cfg.classifier.base_url,
        cfg.classifier.api_token.clone(),
        cfg.classifier.gateway_settings(),
    )
    .context("building classification gateway")?;
    let models = ModelChain::new(
        cfg.classifier.primary_model.clone(),
        cfg.classifier.fallback_models.clone(),
        cfg.classifier.fallback_on_failure,
    );
    tracing::info!(
        base = %cfg.classifier.base_url,
        models = ?models.candidates(),
        "state.classifier"
    );
    let media = MediaAnalyzer::new(
        FrameExtractor::new(Arc::new(FfmpegDecoder::default())),
        Arc::new(gateway),
        models,
        cfg.policy.clone(),
        deadline,
    );

    let search = TavilyClient::with_base(&cfg.search.base_url, cfg.search.api_key.clone())
        .context("building search client")?
        .with_depth(cfg.search.search_depth)
        .with_timeout(Duration::from_secs(cfg.search.timeout_secs));
    let llm = ensure_llm_ready(&cfg.llm)
        .await
        .context("initialising LLM client")?;
    tracing::info!(
        provider = cfg.llm.provider_name(),
        model = llm.model_name(),
        "state.llm"
    );
    // An unreachable provider only degrades claim verification; start anyway.
    match llm.health_check().await {
        Ok(true) => tracing::info!(model = llm.model_name(), "state.llm_ready"),
        Ok(false) => tracing::warn!(model = llm.model_name(), "state.llm_unhealthy"),
        Err(e) => tracing::warn!(model = llm.model_name(), error = %e, "state.llm_unhealthy"),
    }
    let claims = ClaimVerifier::new(Arc::new(search), llm, deadline);

    Ok(AppState {
        media: Arc::new(media),
        claims: Arc::new(claims),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use verisight_common::LlmConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(llm_endpoint: &str) -> VerisightConfig {
        let mut cfg = VerisightConfig::default();
        cfg.classifier.api_token = "hf-test".into();
        cfg.search.api_key = "tvly-test".into();
        cfg.llm = LlmConfig::Openai {
            api_key: "sk-test".into(),
            model: "gpt-test".into(),
            endpoint: llm_endpoint.to_string(),
            temperature: None,
        };
        cfg
    }

    #[tokio::test]
    async fn startup_checks_llm_health_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "gpt-test",
                "choices": [{"message": {"content": "OK"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        build_state(&config_for(&server.uri()))
            .await
            .expect("state builds");
    }

    #[tokio::test]
    async fn unhealthy_llm_does_not_block_startup() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"error": {"message": "bad key"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        assert!(build_state(&config_for(&server.uri())).await.is_ok());
    }
}
