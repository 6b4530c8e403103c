use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::quiz::prompt::{build_explanation_prompt, build_mcq_prompt, PromptSettings};
use crate::quiz::{Quiz, Rejection};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request to the generation endpoint failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generation endpoint answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("generation reply carried no text")]
    EmptyReply,
    #[error("no JSON array found in the generation reply")]
    NoJsonArray,
    #[error("JSON array in the generation reply is malformed: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("ChatGPT request failed: {0}")]
    ChatGpt(#[from] chatgpt::err::Error),
    #[error("generation reply contained no usable questions")]
    NoUsableQuestions,
}

/// A backend that turns one prompt into free text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Parses the slice between the first `[` and the last `]` of `reply`.
///
/// Models like to wrap the array in prose or code fences, so anything outside
/// the brackets is ignored.
pub fn extract_json_array<T: DeserializeOwned>(reply: &str) -> Result<Vec<T>, GenerationError> {
    let start = reply.find('[').ok_or(GenerationError::NoJsonArray)?;
    let end = reply.rfind(']').ok_or(GenerationError::NoJsonArray)?;
    if end < start {
        return Err(GenerationError::NoJsonArray);
    }

    Ok(serde_json::from_str(&reply[start..=end])?)
}

#[derive(Debug, serde::Deserialize)]
struct Annotated {
    explanation: Option<String>,
}

/// The outcome of a question pass: the usable questions and the ones that
/// failed validation.
#[derive(Debug)]
pub struct GeneratedQuiz {
    pub quiz: Quiz,
    pub rejected: Vec<Rejection>,
}

pub struct QuizGenerator {
    backend: Box<dyn TextGenerator>,
    settings: PromptSettings,
}

impl QuizGenerator {
    pub fn new(backend: Box<dyn TextGenerator>, settings: PromptSettings) -> Self {
        Self { backend, settings }
    }

    pub fn question_count(&self) -> usize {
        self.settings.question_count
    }

    pub async fn generate(&self, topic: &str) -> Result<GeneratedQuiz, GenerationError> {
        log::info!("Generating {} questions for topic {:?}", self.settings.question_count, topic);
        let prompt = build_mcq_prompt(topic, &self.settings);
        log::debug!("Question prompt: {}", prompt);

        let reply = self.backend.complete(&prompt).await?;
        log::debug!("Question reply: {}", reply);

        let items: Vec<serde_json::Value> = extract_json_array(&reply)?;
        let (quiz, rejected) = Quiz::from_json(items);
        for rejection in &rejected {
            log::warn!("Rejected question {}: {}", rejection.number, rejection.reason);
        }
        if quiz.is_empty() {
            return Err(GenerationError::NoUsableQuestions);
        }

        Ok(GeneratedQuiz { quiz, rejected })
    }

    /// Second pass: asks the backend to annotate every question with a short
    /// explanation and attaches them by position.
    pub async fn add_explanations(&self, quiz: &mut Quiz) -> Result<(), GenerationError> {
        let prompt = build_explanation_prompt(&quiz.questions)?;
        let reply = self.backend.complete(&prompt).await?;
        log::debug!("Explanation reply: {}", reply);

        let annotated: Vec<Annotated> = extract_json_array(&reply)?;
        if annotated.len() != quiz.len() {
            log::warn!(
                "Explanation pass returned {} items for {} questions",
                annotated.len(),
                quiz.len()
            );
        }

        for (question, item) in quiz.questions.iter_mut().zip(annotated) {
            if let Some(explanation) = item.explanation.map(|e| e.trim().to_string()) {
                if !explanation.is_empty() {
                    question.explanation = Some(explanation);
                }
            }
        }
        Ok(())
    }
}
