use axum::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::profiles::repo::Tier;
use crate::questions::dto::Source;

/// What kind of question to ask the model for.
#[derive(Debug, Clone)]
pub struct QuestionSpec {
    pub category: String,
    pub subcategory: Option<String>,
    pub difficulty: String,
    pub tier: Tier,
    pub premium: bool,
}

/// A generated question as returned by the model, validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
    #[serde(default)]
    pub premium_explanation: Option<String>,
    #[serde(default)]
    pub sources: Option<Vec<Source>>,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("llm returned no content")]
    Empty,
    #[error("invalid question payload: {0}")]
    Invalid(String),
}

#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(&self, spec: &QuestionSpec) -> Result<GeneratedQuestion, LlmError>;
}

fn category_blurb(category: &str) -> &str {
    match category {
        "Chumash" => "Chumash (Five Books of Moses)",
        "Tanach" => "Tanach (Bible: Chumash, Neviim, Ketuvim)",
        "Talmud" => "Talmud (Gemara and Mishnah)",
        "Halacha" => "Halacha (Jewish Law)",
        "Jewish History" => "Jewish History (from Biblical times to modern era)",
        other => other,
    }
}

pub fn build_prompt(spec: &QuestionSpec) -> String {
    let premium_fields = if spec.premium {
        r#",
  "premium_explanation": "A deeper explanation citing the relevant sources",
  "sources": [{"text": "Quoted source text", "source": "e.g. Bereishit 1:1", "commentary": "Optional context"}]"#
    } else {
        ""
    };

    let mut prompt = format!(
        r#"Generate a Torah trivia question. Return ONLY valid JSON in this exact format:
{{
  "question": "The question text",
  "options": ["Option A", "Option B", "Option C", "Option D"],
  "correct_answer": "Option A",
  "explanation": "Brief explanation of why this is correct (2-3 sentences)"{premium_fields}
}}

Category: {}
Difficulty: {}
"#,
        category_blurb(&spec.category),
        spec.difficulty,
    );

    if let Some(sub) = &spec.subcategory {
        prompt.push_str(&format!("Focus on: {sub}\n"));
    }

    prompt.push_str(&format!(
        "\nGenerate a {} difficulty {} trivia question appropriate for a {:?} level student.",
        spec.difficulty, spec.category, spec.tier
    ));
    prompt
}

/// Validate the model's JSON reply. Tolerates a markdown code fence around
/// the payload, which chat models emit even when told not to.
pub fn parse_generated(content: &str) -> Result<GeneratedQuestion, LlmError> {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.strip_suffix("```").unwrap_or(s))
        .unwrap_or(trimmed)
        .trim();

    let question: GeneratedQuestion =
        serde_json::from_str(trimmed).map_err(|e| LlmError::Invalid(e.to_string()))?;

    if question.question.trim().is_empty() {
        return Err(LlmError::Invalid("empty question text".into()));
    }
    if question.options.len() < 2 {
        return Err(LlmError::Invalid("fewer than two options".into()));
    }
    if !question.options.contains(&question.correct_answer) {
        return Err(LlmError::Invalid(
            "correct answer is not one of the options".into(),
        ));
    }
    if question.explanation.trim().is_empty() {
        return Err(LlmError::Invalid("empty explanation".into()));
    }
    Ok(question)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Question generator backed by an OpenAI-compatible chat completions API.
#[derive(Clone)]
pub struct OpenAiGenerator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiGenerator {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl QuestionGenerator for OpenAiGenerator {
    async fn generate(&self, spec: &QuestionSpec) -> Result<GeneratedQuestion, LlmError> {
        let prompt = build_prompt(spec);
        debug!(category = %spec.category, difficulty = %spec.difficulty, "generating question");

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatRequestMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: 0.7,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response: ChatResponse = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::Empty)?;

        parse_generated(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "question": "Which sea split during the Exodus?",
        "options": ["Yam Suf", "The Jordan", "The Kinneret", "The Dead Sea"],
        "correct_answer": "Yam Suf",
        "explanation": "The Torah describes the splitting of Yam Suf as Israel left Egypt."
    }"#;

    fn spec() -> QuestionSpec {
        QuestionSpec {
            category: "Chumash".into(),
            subcategory: Some("Beshalach".into()),
            difficulty: "medium".into(),
            tier: Tier::Student,
            premium: false,
        }
    }

    #[test]
    fn parses_valid_payload() {
        let q = parse_generated(VALID).expect("valid payload");
        assert_eq!(q.correct_answer, "Yam Suf");
        assert_eq!(q.options.len(), 4);
        assert!(q.premium_explanation.is_none());
    }

    #[test]
    fn parses_payload_wrapped_in_code_fence() {
        let fenced = format!("```json\n{VALID}\n```");
        let q = parse_generated(&fenced).expect("fenced payload");
        assert_eq!(q.correct_answer, "Yam Suf");
    }

    #[test]
    fn rejects_answer_missing_from_options() {
        let bad = VALID.replace("\"Yam Suf\",", "\"Some Other Sea\",");
        let err = parse_generated(&bad).unwrap_err();
        assert!(matches!(err, LlmError::Invalid(_)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_generated("not json at all"),
            Err(LlmError::Invalid(_))
        ));
    }

    #[test]
    fn prompt_mentions_category_and_difficulty() {
        let prompt = build_prompt(&spec());
        assert!(prompt.contains("Chumash (Five Books of Moses)"));
        assert!(prompt.contains("medium"));
        assert!(prompt.contains("Focus on: Beshalach"));
        assert!(!prompt.contains("premium_explanation"));
    }

    #[test]
    fn premium_prompt_asks_for_sources() {
        let mut premium = spec();
        premium.premium = true;
        let prompt = build_prompt(&premium);
        assert!(prompt.contains("premium_explanation"));
        assert!(prompt.contains("sources"));
    }
}
