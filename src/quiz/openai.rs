use std::time::Duration;

use async_trait::async_trait;
use chatgpt::{
    client::ChatGPT,
    config::{ChatGPTEngine, ModelConfiguration},
    types::CompletionResponse,
};

use crate::quiz::generator::{GenerationError, TextGenerator};

/// OpenAI chat backend, for deployments that prefer ChatGPT over Gemini.
pub struct ChatGptClient {
    chat_gpt: ChatGPT,
}

impl ChatGptClient {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, GenerationError> {
        Self::with_config(api_key, configuration(timeout))
    }

    /// The HTTP client is built from `config` once, so the timeout has to be
    /// set here rather than on `chat_gpt.config` afterwards.
    fn with_config(api_key: &str, config: ModelConfiguration) -> Result<Self, GenerationError> {
        let chat_gpt = ChatGPT::new_with_config(api_key, config)?;
        Ok(Self { chat_gpt })
    }
}

fn configuration(timeout: Duration) -> ModelConfiguration {
    ModelConfiguration {
        engine: ChatGPTEngine::Gpt35Turbo,
        timeout,
        ..Default::default()
    }
}

#[async_trait]
impl TextGenerator for ChatGptClient {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let response: CompletionResponse = self.chat_gpt.send_message(prompt).await?;
        let content = response
            .message_choices
            .first()
            .map(|choice| choice.message.content.clone())
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(GenerationError::EmptyReply);
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ENDPOINT: &str = "/v1/chat/completions";

    fn completion(content: &str) -> String {
        serde_json::json!({
            "id": "chatcmpl-1",
            "created": 1700000000,
            "model": "gpt-3.5-turbo",
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 },
            "choices": [{
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop",
                "index": 0
            }]
        })
        .to_string()
    }

    fn client(server: &mockito::ServerGuard, timeout: Duration) -> ChatGptClient {
        let mut config = configuration(timeout);
        config.api_url = format!("{}{}", server.url(), ENDPOINT).parse().unwrap();
        ChatGptClient::with_config("test-key", config).unwrap()
    }

    #[test]
    fn configuration_carries_the_timeout() {
        let config = configuration(Duration::from_secs(60));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.engine, ChatGPTEngine::Gpt35Turbo);
    }

    #[tokio::test]
    async fn returns_the_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", ENDPOINT)
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion("[{\"question\": \"Q\"}]"))
            .create_async()
            .await;

        let text = client(&server, Duration::from_secs(5))
            .complete("make a quiz")
            .await
            .unwrap();

        assert_eq!(text, r#"[{"question": "Q"}]"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn blank_reply_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", ENDPOINT)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion("  "))
            .create_async()
            .await;

        let result = client(&server, Duration::from_secs(5)).complete("prompt").await;
        assert!(matches!(result, Err(GenerationError::EmptyReply)));
    }

    #[tokio::test]
    async fn slow_reply_hits_the_configured_timeout() {
        let mut server = mockito::Server::new_async().await;
        let body = completion("too late");
        let _mock = server
            .mock("POST", ENDPOINT)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_chunked_body(move |w| {
                std::thread::sleep(Duration::from_secs(2));
                w.write_all(body.as_bytes())
            })
            .create_async()
            .await;

        let started = std::time::Instant::now();
        let result = client(&server, Duration::from_millis(200))
            .complete("prompt")
            .await;

        assert!(matches!(result, Err(GenerationError::ChatGpt(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
