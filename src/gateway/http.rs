use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use tracing::{error, warn};

use super::art::ArtClient;
use super::chat::ChatClient;
use super::{GatewayError, RemoteService, ResearchAnswer, Result};
use crate::config::Config;

/// Map a failed request to the gateway taxonomy
pub(crate) fn request_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

/// Pass successful responses through, classify the rest
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(1000).collect();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        warn!("Rate limited by {}: {}", url, body);
        return Err(GatewayError::RateLimited);
    }

    error!("Remote service {} returned {}: {}", url, status, body);
    Err(GatewayError::Upstream(status.as_u16()))
}

/// The production services, all over HTTPS
pub struct HttpServices {
    art: ArtClient,
    research: ChatClient,
    summarizer: ChatClient,
    research_preprompt: String,
}

impl HttpServices {
    pub fn new(config: &Config) -> AnyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.gateway.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let research = ChatClient::new(
            client.clone(),
            &config.research.base_url,
            &config.research.api_key,
            &config.research.model,
            config.research.max_tokens,
        );
        let summarizer = ChatClient::new(
            client.clone(),
            &config.summarizer.base_url,
            &config.summarizer.api_key,
            &config.summarizer.model,
            config.summarizer.max_tokens,
        );

        Ok(Self {
            art: ArtClient::new(client, config.art.clone()),
            research,
            summarizer,
            research_preprompt: config.research.preprompt.clone(),
        })
    }
}

fn summary_prompt(transcript: &str) -> String {
    format!(
        "summarize the following chat:\nCHAT_BEGIN{transcript}\nCHAT_END\n\
         Your summary should be no larger than two paragraphs of 4 sentences each."
    )
}

#[async_trait]
impl RemoteService for HttpServices {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        self.art.generate(prompt).await
    }

    async fn research(&self, query: &str) -> Result<ResearchAnswer> {
        let prompt = format!("{}{}", self.research_preprompt, query);
        let completion = self.research.complete(&prompt).await?;
        Ok(ResearchAnswer {
            text: completion.content,
            citations: completion.citations,
        })
    }

    async fn summarize(&self, transcript: &str) -> Result<String> {
        let completion = self.summarizer.complete(&summary_prompt(transcript)).await?;
        Ok(completion.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn services(base: &str, timeout_secs: u64) -> HttpServices {
        let config = Config::parse(&format!(
            r#"
            [telegram]
            bot_token = "t"

            [gateway]
            timeout_secs = {timeout_secs}

            [art]
            api_key = "art-key"
            base_url = "{base}"

            [research]
            api_key = "px-key"
            base_url = "{base}/px"
            preprompt = "Be brief. "

            [summarizer]
            api_key = "hf-key"
            base_url = "{base}/hf/"
            "#
        ))
        .unwrap();
        HttpServices::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_generate_image_posts_prompt_and_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/image/generation"))
            .and(header("authorization", "Bearer art-key"))
            .and(body_partial_json(json!({
                "model_name": "FLUX.1-dev",
                "prompt": "a red fox in snow"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"images": [{"image": "aGVsbG8="}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let bytes = services(&server.uri(), 5)
            .generate_image("a red fox in snow")
            .await
            .unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn test_research_returns_citations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/px/chat/completions"))
            .and(body_partial_json(json!({
                "model": "sonar-pro",
                "messages": [{"role": "user", "content": "Be brief. why is the sky blue"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Rayleigh [1]"}}],
                "citations": ["https://physics.example"]
            })))
            .mount(&server)
            .await;

        let answer = services(&server.uri(), 5)
            .research("why is the sky blue")
            .await
            .unwrap();
        assert_eq!(answer.text, "Rayleigh [1]");
        assert_eq!(answer.citations, vec!["https://physics.example"]);
    }

    #[tokio::test]
    async fn test_summarize_wraps_transcript() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hf/chat/completions"))
            .and(body_partial_json(json!({
                "messages": [{"role": "user", "content": summary_prompt("ann: hi")}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Ann said hi."}}]
            })))
            .mount(&server)
            .await;

        let summary = services(&server.uri(), 5).summarize("ann: hi").await.unwrap();
        assert_eq!(summary, "Ann said hi.");
    }

    #[tokio::test]
    async fn test_status_codes_are_classified() {
        let server = MockServer::start().await;
        Mock::given(path("/image/generation"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(path("/px/chat/completions"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let svc = services(&server.uri(), 5);
        assert!(matches!(
            svc.generate_image("p").await,
            Err(GatewayError::RateLimited)
        ));
        assert!(matches!(
            svc.research("q").await,
            Err(GatewayError::Upstream(502))
        ));
    }

    #[tokio::test]
    async fn test_empty_completion_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(path("/hf/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        assert!(matches!(
            services(&server.uri(), 5).summarize("x: y").await,
            Err(GatewayError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(path("/image/generation"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        assert!(matches!(
            services(&server.uri(), 1).generate_image("p").await,
            Err(GatewayError::Timeout)
        ));
    }
}
