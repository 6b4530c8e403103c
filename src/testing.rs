//! Fakes for the unit tests: a chat that records what the bot sends and a
//! generation backend that replays canned replies.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use teloxide::{types::MessageId, ApiError, RequestError};

use crate::pacing::PacingPolicy;
use crate::quiz::dispatch::{ChatTarget, QuizChannel, QuizPoll, TextStyle};
use crate::quiz::generator::{GenerationError, TextGenerator};

pub fn instant_pacing() -> PacingPolicy {
    PacingPolicy {
        private_interval: Duration::ZERO,
        group_interval: Duration::ZERO,
        after_poll: Duration::ZERO,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { text: String, style: TextStyle },
    Pin(MessageId),
    Poll(QuizPoll),
}

/// Records every outbound call. Message ids count up from 1.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(ChatTarget, Sent)>>,
    fail_at: Option<usize>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects the call with the given zero-based index, and every call after
    /// it keeps failing too because nothing more gets recorded.
    pub fn failing_at(call: usize) -> Self {
        Self {
            sent: Mutex::default(),
            fail_at: Some(call),
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, sent)| sent.clone())
            .collect()
    }

    pub fn targets(&self) -> Vec<ChatTarget> {
        self.sent.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, target: &ChatTarget, sent: Sent) -> Result<MessageId, RequestError> {
        let mut log = self.sent.lock().unwrap();
        if self.fail_at == Some(log.len()) {
            return Err(RequestError::Api(ApiError::BotBlocked));
        }
        log.push((*target, sent));
        Ok(MessageId(log.len() as i32))
    }
}

#[async_trait]
impl QuizChannel for RecordingChannel {
    async fn send_text(
        &self,
        target: &ChatTarget,
        text: &str,
        style: TextStyle,
    ) -> Result<MessageId, RequestError> {
        self.record(
            target,
            Sent::Text {
                text: text.to_string(),
                style,
            },
        )
    }

    async fn pin(&self, target: &ChatTarget, message: MessageId) -> Result<(), RequestError> {
        self.record(target, Sent::Pin(message)).map(|_| ())
    }

    async fn send_quiz_poll(
        &self,
        target: &ChatTarget,
        poll: &QuizPoll,
    ) -> Result<MessageId, RequestError> {
        self.record(target, Sent::Poll(poll.clone()))
    }
}

/// Replays replies in order and keeps the prompts it was given.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, GenerationError>>) -> (Self, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let generator = Self {
            replies: Mutex::new(replies.into()),
            prompts: prompts.clone(),
        };
        (generator, prompts)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerationError::EmptyReply))
    }
}
