use crate::quiz::Question;

/// What the question prompt asks for, besides the topic.
#[derive(Debug, Clone)]
pub struct PromptSettings {
    pub question_count: usize,
    pub audience: String,
}

/// Kept below Telegram's 300-character poll question limit.
pub const QUESTION_CHAR_LIMIT: usize = 280;

pub fn build_mcq_prompt(topic: &str, settings: &PromptSettings) -> String {
    format!(
        "Generate {count} multiple choice questions about the topic: '{topic}' for {audience}. \
        Each item must have four choices labeled a, b, c, and d, and specify the correct answer as \"answer\": \"a\". \
        Keep every question under {limit} characters. \
        Add a \"keywords\" field with two or three comma-separated hint words that do not give the answer away. \
        Respond in JSON array format only. Example:\n\
        [{{\"question\": \"...\", \"a\": \"...\", \"b\": \"...\", \"c\": \"...\", \"d\": \"...\", \"answer\": \"...\", \"keywords\": \"...\"}}, ...]",
        count = settings.question_count,
        topic = topic,
        audience = settings.audience,
        limit = QUESTION_CHAR_LIMIT,
    )
}

pub fn build_explanation_prompt(questions: &[Question]) -> Result<String, serde_json::Error> {
    let raw = questions.iter().map(Question::to_raw).collect::<Vec<_>>();
    let json = serde_json::to_string_pretty(&raw)?;

    Ok(format!(
        "For each question object in the JSON array below, add a field called \"explanation\". \
        The explanation must be concise (under 100 characters). Only return valid JSON. No extra text.\n\n{}",
        json
    ))
}
