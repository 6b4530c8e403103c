use std::fmt;

use async_trait::async_trait;
use teloxide::{
    payloads::{PinChatMessageSetters, SendMessageSetters, SendPollSetters},
    prelude::*,
    types::{MessageId, ParseMode, PollType},
    utils::html,
    RequestError,
};
use thiserror::Error;

use crate::pacing::{Pacer, PacingPolicy};
use crate::quiz::{Question, Quiz};

// Telegram Bot API limits for sendPoll.
pub const POLL_QUESTION_LIMIT: usize = 300;
pub const POLL_OPTION_LIMIT: usize = 100;
pub const POLL_EXPLANATION_LIMIT: usize = 200;

/// Where a quiz is delivered: a chat and, in forum supergroups, a topic thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatTarget {
    pub chat_id: ChatId,
    pub thread_id: Option<i32>,
    pub is_group: bool,
}

impl ChatTarget {
    pub fn from_message(msg: &Message) -> Self {
        Self {
            chat_id: msg.chat.id,
            thread_id: msg.thread_id,
            is_group: msg.chat.is_group() || msg.chat.is_supergroup(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Plain,
    Html,
}

/// A Telegram quiz poll, already clipped to the platform limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizPoll {
    pub question: String,
    pub options: Vec<String>,
    pub correct_option: u8,
    pub explanation: Option<String>,
}

impl QuizPoll {
    pub fn from_question(question: &Question) -> Self {
        Self {
            question: clip(&question.text, POLL_QUESTION_LIMIT),
            options: question
                .choices
                .iter()
                .map(|choice| clip(choice, POLL_OPTION_LIMIT))
                .collect(),
            correct_option: question.answer.index() as u8,
            explanation: question
                .explanation
                .clone()
                .filter(|e| e.chars().count() <= POLL_EXPLANATION_LIMIT),
        }
    }
}

/// The chat operations a quiz delivery needs.
#[async_trait]
pub trait QuizChannel: Send + Sync {
    async fn send_text(
        &self,
        target: &ChatTarget,
        text: &str,
        style: TextStyle,
    ) -> Result<MessageId, RequestError>;

    async fn pin(&self, target: &ChatTarget, message: MessageId) -> Result<(), RequestError>;

    async fn send_quiz_poll(
        &self,
        target: &ChatTarget,
        poll: &QuizPoll,
    ) -> Result<MessageId, RequestError>;
}

#[async_trait]
impl QuizChannel for Bot {
    async fn send_text(
        &self,
        target: &ChatTarget,
        text: &str,
        style: TextStyle,
    ) -> Result<MessageId, RequestError> {
        let mut request = self.send_message(target.chat_id, text);
        if let Some(thread_id) = target.thread_id {
            request = request.message_thread_id(thread_id);
        }
        if style == TextStyle::Html {
            request = request.parse_mode(ParseMode::Html);
        }
        Ok(request.await?.id)
    }

    async fn pin(&self, target: &ChatTarget, message: MessageId) -> Result<(), RequestError> {
        self.pin_chat_message(target.chat_id, message)
            .disable_notification(true)
            .await?;
        Ok(())
    }

    async fn send_quiz_poll(
        &self,
        target: &ChatTarget,
        poll: &QuizPoll,
    ) -> Result<MessageId, RequestError> {
        let mut request = self
            .send_poll(target.chat_id, poll.question.clone(), poll.options.clone())
            .type_(PollType::Quiz)
            .correct_option_id(poll.correct_option)
            .is_anonymous(false);
        if let Some(explanation) = &poll.explanation {
            request = request.explanation(explanation.clone());
        }
        if let Some(thread_id) = target.thread_id {
            request = request.message_thread_id(thread_id);
        }
        Ok(request.await?.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStep {
    Announce,
    Pin,
    Poll,
    Hint,
    Explanation,
}

impl fmt::Display for DispatchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DispatchStep::Announce => "announcing the question",
            DispatchStep::Pin => "pinning the announcement",
            DispatchStep::Poll => "sending the poll",
            DispatchStep::Hint => "sending the hint",
            DispatchStep::Explanation => "sending the explanation",
        })
    }
}

/// The question a delivery run stopped at; `number` is 1-based.
#[derive(Debug, Error)]
#[error("question {number} failed while {step}: {source}")]
pub struct QuestionFailure {
    pub number: usize,
    pub step: DispatchStep,
    #[source]
    pub source: RequestError,
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub pin_questions: bool,
    pub announce_body: bool,
    pub pacing: PacingPolicy,
}

/// Delivers every question in order and returns how many went out.
///
/// The run stops at the first failed call; questions before it stay in the
/// chat.
pub async fn dispatch_quiz<C>(
    channel: &C,
    target: &ChatTarget,
    quiz: &Quiz,
    settings: &DispatchSettings,
) -> Result<usize, QuestionFailure>
where
    C: QuizChannel + ?Sized,
{
    let mut pacer = Pacer::new(&settings.pacing, target.is_group);

    for (i, question) in quiz.questions.iter().enumerate() {
        let number = i + 1;
        send_question(channel, target, number, question, settings, &mut pacer)
            .await
            .map_err(|(step, source)| QuestionFailure {
                number,
                step,
                source,
            })?;
        log::debug!(
            "Sent question {}/{} to {} (answer: {})",
            number,
            quiz.len(),
            target.chat_id,
            question.correct_choice()
        );
    }

    Ok(quiz.len())
}

async fn send_question<C>(
    channel: &C,
    target: &ChatTarget,
    number: usize,
    question: &Question,
    settings: &DispatchSettings,
    pacer: &mut Pacer,
) -> Result<(), (DispatchStep, RequestError)>
where
    C: QuizChannel + ?Sized,
{
    let at = |step: DispatchStep| move |err: RequestError| (step, err);

    pacer.acquire().await;
    let announced = channel
        .send_text(target, &announcement(number, question, settings), TextStyle::Html)
        .await
        .map_err(at(DispatchStep::Announce))?;

    if settings.pin_questions {
        pacer.acquire().await;
        channel
            .pin(target, announced)
            .await
            .map_err(at(DispatchStep::Pin))?;
    }

    let poll = QuizPoll::from_question(question);
    pacer.acquire().await;
    channel
        .send_quiz_poll(target, &poll)
        .await
        .map_err(at(DispatchStep::Poll))?;

    if let Some(keywords) = &question.keywords {
        pacer.acquire().await;
        channel
            .send_text(target, &reveal("💡 Hint", keywords), TextStyle::Html)
            .await
            .map_err(at(DispatchStep::Hint))?;
    }

    if poll.explanation.is_none() {
        if let Some(explanation) = &question.explanation {
            pacer.acquire().await;
            channel
                .send_text(target, &reveal("📖 Explanation", explanation), TextStyle::Html)
                .await
                .map_err(at(DispatchStep::Explanation))?;
        }
    }

    pacer.hold();
    Ok(())
}

fn announcement(number: usize, question: &Question, settings: &DispatchSettings) -> String {
    let header = format!("🔹 <b>Question no. {}</b>", number);
    if settings.announce_body || question.text.chars().count() > POLL_QUESTION_LIMIT {
        format!("{}\n\n{}", header, html::escape(&question.text))
    } else {
        header
    }
}

/// Text hidden behind Telegram's tap-to-reveal spoiler.
fn reveal(label: &str, text: &str) -> String {
    format!("{}: <tg-spoiler>{}</tg-spoiler>", label, html::escape(text))
}

fn clip(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut clipped = text.chars().take(limit - 1).collect::<String>();
    clipped.push('…');
    clipped
}
