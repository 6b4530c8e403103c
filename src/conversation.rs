use teloxide::{utils::command::BotCommands, utils::html, RequestError};

use crate::quiz::dispatch::{dispatch_quiz, ChatTarget, DispatchSettings, QuizChannel, TextStyle};
use crate::quiz::generator::QuizGenerator;

pub const ASK_TOPIC_TEXT: &str = "🧠 What topic do you want to generate MCQs for?";
pub const EMPTY_TOPIC_TEXT: &str = "Please send the topic as text.";
pub const CANCELED_TEXT: &str = "❌ Quiz canceled.";
pub const NOTHING_TO_CANCEL_TEXT: &str = "Nothing to cancel.";
pub const USE_START_TEXT: &str = "Please use /start to begin.";
pub const GENERATION_FAILED_TEXT: &str = "❌ Failed to generate questions.";
pub const EXPLANATIONS_FAILED_TEXT: &str = "❌ Failed to add explanations.";
pub const QUIZ_COMPLETE_TEXT: &str = "✅ Quiz complete!";

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub enum State {
    #[default]
    Idle,
    AwaitingTopic,
}

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "generate a quiz about a topic.")]
    Start,
    #[command(description = "cancel the current quiz request.")]
    Cancel,
    #[command(description = "display this text.")]
    Help,
}

/// What a plain text message means for the conversation.
#[derive(Debug, PartialEq, Eq)]
pub enum TextAction {
    /// Not meant for the bot; stay silent.
    Ignore,
    RemindStart,
    AskAgain,
    Topic(String),
}

/// In groups the bot only listens to messages that mention `@bot_username`;
/// every mention is cut out and the remaining words are rejoined.
pub fn addressed_text(text: &str, is_group: bool, bot_username: &str) -> Option<String> {
    if !is_group {
        return Some(text.trim().to_string());
    }

    // Usernames are ASCII, so a match always starts and ends on a char boundary.
    let mention = format!("@{}", bot_username.trim_start_matches('@'));
    let needle = mention.as_bytes();
    let haystack = text.as_bytes();

    let mut remainder = String::with_capacity(text.len());
    let mut found = false;
    let (mut copied, mut i) = (0, 0);
    while i + needle.len() <= haystack.len() {
        let end = i + needle.len();
        let whole_name = haystack
            .get(end)
            .map_or(true, |&next| !(next.is_ascii_alphanumeric() || next == b'_'));
        if whole_name && haystack[i..end].eq_ignore_ascii_case(needle) {
            remainder.push_str(&text[copied..i]);
            remainder.push(' ');
            i += needle.len();
            copied = i;
            found = true;
        } else {
            i += 1;
        }
    }
    remainder.push_str(&text[copied..]);

    found.then(|| remainder.split_whitespace().collect::<Vec<_>>().join(" "))
}

pub fn route_text(state: &State, text: &str, is_group: bool, bot_username: &str) -> TextAction {
    // Unknown commands are not topics.
    if text.trim_start().starts_with('/') {
        return TextAction::Ignore;
    }
    let Some(addressed) = addressed_text(text, is_group, bot_username) else {
        return TextAction::Ignore;
    };

    match state {
        State::Idle => TextAction::RemindStart,
        State::AwaitingTopic if addressed.is_empty() => TextAction::AskAgain,
        State::AwaitingTopic => TextAction::Topic(addressed),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { delivered: usize },
    GenerationFailed,
    ExplanationsFailed,
    Aborted { delivered: usize },
}

/// Everything a quiz run needs, built once at start-up and shared by all
/// chats.
pub struct QuizService {
    generator: QuizGenerator,
    explanations: bool,
    dispatch: DispatchSettings,
    bot_username: String,
}

impl QuizService {
    pub fn new(
        generator: QuizGenerator,
        explanations: bool,
        dispatch: DispatchSettings,
        bot_username: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            explanations,
            dispatch,
            bot_username: bot_username.into(),
        }
    }

    pub fn bot_username(&self) -> &str {
        &self.bot_username
    }

    /// Generates a quiz about `topic` and delivers it to `target`.
    ///
    /// Generation and delivery problems are reported in the chat and returned
    /// as the outcome; only a failure to post those reports is an error.
    pub async fn run<C>(
        &self,
        channel: &C,
        target: &ChatTarget,
        topic: &str,
    ) -> Result<RunOutcome, RequestError>
    where
        C: QuizChannel + ?Sized,
    {
        channel
            .send_text(
                target,
                &format!(
                    "⏳ Generating {} MCQs for topic: <b>{}</b>",
                    self.generator.question_count(),
                    html::escape(topic)
                ),
                TextStyle::Html,
            )
            .await?;

        let generated = match self.generator.generate(topic).await {
            Ok(generated) => generated,
            Err(err) => {
                log::error!("Question generation for {:?} failed: {}", topic, err);
                channel
                    .send_text(target, GENERATION_FAILED_TEXT, TextStyle::Plain)
                    .await?;
                return Ok(RunOutcome::GenerationFailed);
            }
        };

        let mut quiz = generated.quiz;
        if !generated.rejected.is_empty() {
            let report = generated
                .rejected
                .iter()
                .map(|r| format!("⚠️ Skipped question {}: {}", r.number, r.reason))
                .collect::<Vec<_>>()
                .join("\n");
            channel.send_text(target, &report, TextStyle::Plain).await?;
        }

        if self.explanations {
            if let Err(err) = self.generator.add_explanations(&mut quiz).await {
                log::error!("Explanation pass for {:?} failed: {}", topic, err);
                channel
                    .send_text(target, EXPLANATIONS_FAILED_TEXT, TextStyle::Plain)
                    .await?;
                return Ok(RunOutcome::ExplanationsFailed);
            }
        }

        match dispatch_quiz(channel, target, &quiz, &self.dispatch).await {
            Ok(delivered) => {
                log::info!("Delivered {} questions to {}", delivered, target.chat_id);
                channel
                    .send_text(target, QUIZ_COMPLETE_TEXT, TextStyle::Plain)
                    .await?;
                Ok(RunOutcome::Completed { delivered })
            }
            Err(failure) => {
                log::error!("Quiz delivery to {} stopped: {}", target.chat_id, failure);
                let delivered = failure.number - 1;
                let notice = format!(
                    "⚠️ Quiz stopped at question {} of {} ({} failed).",
                    failure.number,
                    quiz.len(),
                    failure.step
                );
                // The chat that just failed may well reject this too.
                if let Err(err) = channel.send_text(target, &notice, TextStyle::Plain).await {
                    log::warn!("Could not report the failure to {}: {}", target.chat_id, err);
                }
                Ok(RunOutcome::Aborted { delivered })
            }
        }
    }
}
