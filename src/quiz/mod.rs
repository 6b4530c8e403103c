pub mod dispatch;
pub mod gemini;
pub mod generator;
pub mod openai;
pub mod prompt;

use std::fmt;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// A question exactly as the generation backend returned it.
///
/// Every field is optional on the wire; [`Question::try_from`] decides whether
/// the record is usable.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RawQuestion {
    pub question: Option<String>,
    pub a: Option<String>,
    pub b: Option<String>,
    pub c: Option<String>,
    pub d: Option<String>,
    pub answer: Option<String>,
    pub explanation: Option<String>,
    #[serde(deserialize_with = "words")]
    pub keywords: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Words {
    Joined(String),
    List(Vec<String>),
}

/// Keywords arrive either as one comma-separated string or as a list.
fn words<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Words>::deserialize(deserializer)?.map(|words| match words {
        Words::Joined(joined) => joined,
        Words::List(list) => list.join(", "),
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerLetter {
    A,
    B,
    C,
    D,
}

impl AnswerLetter {
    /// Zero-based poll option index of this letter.
    pub fn index(self) -> usize {
        match self {
            AnswerLetter::A => 0,
            AnswerLetter::B => 1,
            AnswerLetter::C => 2,
            AnswerLetter::D => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnswerLetter::A => "a",
            AnswerLetter::B => "b",
            AnswerLetter::C => "c",
            AnswerLetter::D => "d",
        }
    }

    /// Accepts `a`..`d` in either case, optionally followed by `)` or `.`.
    pub fn parse(raw: &str) -> Result<Self, QuizError> {
        let trimmed = raw.trim().trim_end_matches(&[')', '.'][..]).trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "a" => Ok(AnswerLetter::A),
            "b" => Ok(AnswerLetter::B),
            "c" => Ok(AnswerLetter::C),
            "d" => Ok(AnswerLetter::D),
            _ => Err(QuizError::UnknownAnswer(raw.to_string())),
        }
    }
}

impl fmt::Display for AnswerLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuizError {
    #[error("question is malformed: {0}")]
    Malformed(String),
    #[error("question text is missing")]
    MissingQuestion,
    #[error("choice '{0}' is missing")]
    MissingChoice(AnswerLetter),
    #[error("answer '{0}' is not one of a, b, c or d")]
    UnknownAnswer(String),
}

/// A validated multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    pub choices: [String; 4],
    pub answer: AnswerLetter,
    pub explanation: Option<String>,
    pub keywords: Option<String>,
}

impl Question {
    pub fn correct_choice(&self) -> &str {
        &self.choices[self.answer.index()]
    }

    /// Converts back to the wire shape, which is what the explanation pass
    /// shows to the model.
    pub fn to_raw(&self) -> RawQuestion {
        let [a, b, c, d] = self.choices.clone();
        RawQuestion {
            question: Some(self.text.clone()),
            a: Some(a),
            b: Some(b),
            c: Some(c),
            d: Some(d),
            answer: Some(self.answer.as_str().to_string()),
            explanation: self.explanation.clone(),
            keywords: self.keywords.clone(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TryFrom<RawQuestion> for Question {
    type Error = QuizError;

    fn try_from(raw: RawQuestion) -> Result<Self, Self::Error> {
        let text = non_blank(raw.question).ok_or(QuizError::MissingQuestion)?;
        let choice = |value: Option<String>, letter| {
            non_blank(value).ok_or(QuizError::MissingChoice(letter))
        };
        let choices = [
            choice(raw.a, AnswerLetter::A)?,
            choice(raw.b, AnswerLetter::B)?,
            choice(raw.c, AnswerLetter::C)?,
            choice(raw.d, AnswerLetter::D)?,
        ];
        let answer = AnswerLetter::parse(raw.answer.as_deref().unwrap_or_default())?;

        Ok(Self {
            text,
            choices,
            answer,
            explanation: non_blank(raw.explanation),
            keywords: non_blank(raw.keywords),
        })
    }
}

/// A generated question that failed validation; `number` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub number: usize,
    pub reason: QuizError,
}

#[derive(Debug, Clone, Default)]
pub struct Quiz {
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    /// Validates every item of a generated JSON array, keeping the good
    /// questions in order and reporting the rest. An item that does not even
    /// have the wire shape is rejected on its own.
    pub fn from_json(items: Vec<serde_json::Value>) -> (Self, Vec<Rejection>) {
        let mut questions = Vec::with_capacity(items.len());
        let mut rejected = Vec::new();
        for (i, item) in items.into_iter().enumerate() {
            let checked = serde_json::from_value::<RawQuestion>(item)
                .map_err(|err| QuizError::Malformed(err.to_string()))
                .and_then(Question::try_from);
            match checked {
                Ok(question) => questions.push(question),
                Err(reason) => rejected.push(Rejection {
                    number: i + 1,
                    reason,
                }),
            }
        }
        (Self::new(questions), rejected)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(answer: Option<&str>) -> RawQuestion {
        RawQuestion {
            question: Some("Who proposed the stages of cognitive development?".into()),
            a: Some("Erikson".into()),
            b: Some("Piaget".into()),
            c: Some("Vygotsky".into()),
            d: Some("Skinner".into()),
            answer: answer.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn letters_map_to_poll_indices() {
        for (letter, index) in [("a", 0), ("b", 1), ("c", 2), ("d", 3)] {
            assert_eq!(AnswerLetter::parse(letter).unwrap().index(), index);
            assert_eq!(
                AnswerLetter::parse(&letter.to_uppercase()).unwrap().index(),
                index
            );
        }
    }

    #[test]
    fn tolerates_decorated_letters() {
        assert_eq!(AnswerLetter::parse(" b) ").unwrap(), AnswerLetter::B);
        assert_eq!(AnswerLetter::parse("D.").unwrap(), AnswerLetter::D);
    }

    #[test]
    fn unknown_or_missing_answer_is_rejected_not_defaulted() {
        assert_eq!(
            Question::try_from(raw(Some("e"))),
            Err(QuizError::UnknownAnswer("e".into()))
        );
        assert_eq!(
            Question::try_from(raw(Some("Piaget"))),
            Err(QuizError::UnknownAnswer("Piaget".into()))
        );
        assert_eq!(
            Question::try_from(raw(None)),
            Err(QuizError::UnknownAnswer(String::new()))
        );
    }

    #[test]
    fn blank_choice_is_rejected() {
        let mut item = raw(Some("b"));
        item.c = Some("   ".into());
        assert_eq!(
            Question::try_from(item),
            Err(QuizError::MissingChoice(AnswerLetter::C))
        );
    }

    fn value(item: RawQuestion) -> serde_json::Value {
        serde_json::to_value(item).unwrap()
    }

    #[test]
    fn from_json_keeps_order_and_reports_positions() {
        let mut missing_question = raw(Some("a"));
        missing_question.question = None;

        let (quiz, rejected) = Quiz::from_json(vec![
            value(raw(Some("b"))),
            value(missing_question),
            value(raw(Some("D"))),
        ]);

        assert_eq!(quiz.len(), 2);
        assert_eq!(quiz.questions[0].correct_choice(), "Piaget");
        assert_eq!(quiz.questions[1].answer, AnswerLetter::D);
        assert_eq!(
            rejected,
            vec![Rejection {
                number: 2,
                reason: QuizError::MissingQuestion
            }]
        );
    }

    #[test]
    fn blank_optional_fields_become_none() {
        let mut item = raw(Some("a"));
        item.explanation = Some("  ".into());
        item.keywords = Some("schema, assimilation".into());
        let question = Question::try_from(item).unwrap();
        assert_eq!(question.explanation, None);
        assert_eq!(question.keywords.as_deref(), Some("schema, assimilation"));
        assert_eq!(question.to_raw().answer.as_deref(), Some("a"));
    }

    #[test]
    fn keyword_lists_are_joined() {
        let mut item = value(raw(Some("b")));
        item["keywords"] = json!(["schema", "stages"]);

        let (quiz, rejected) = Quiz::from_json(vec![item]);

        assert!(rejected.is_empty());
        assert_eq!(quiz.questions[0].keywords.as_deref(), Some("schema, stages"));
    }

    #[test]
    fn mistyped_item_is_rejected_alone() {
        let mut numeric_answer = value(raw(None));
        numeric_answer["answer"] = json!(2);

        let (quiz, rejected) = Quiz::from_json(vec![
            value(raw(Some("b"))),
            numeric_answer,
            json!("not an object"),
        ]);

        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz.questions[0].correct_choice(), "Piaget");
        assert_eq!(
            rejected.iter().map(|r| r.number).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert!(rejected
            .iter()
            .all(|r| matches!(r.reason, QuizError::Malformed(_))));
    }
}
