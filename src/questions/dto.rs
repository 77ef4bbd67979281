use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::profiles::repo::Tier;
use crate::questions::repo::Question;

/// A cited source backing a premium explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub text: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commentary: Option<String>,
}

/// A question as shown to a player: never carries the correct answer.
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub category: String,
    pub subcategory: Option<String>,
    pub difficulty: String,
    pub tier: Tier,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            question: q.question.clone(),
            options: q.options.clone(),
            category: q.category.clone(),
            subcategory: q.subcategory.clone(),
            difficulty: q.difficulty.clone(),
            tier: q.tier,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NextQuestionQuery {
    pub category: Option<String>,
    pub subcategory: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NextQuestionResponse {
    pub question: PublicQuestion,
    pub question_id: Uuid,
    /// None for pro subscribers (unlimited).
    pub questions_remaining_today: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_id: Uuid,
    pub selected_answer: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub correct: bool,
    pub points_earned: i32,
    pub new_total_points: i32,
    pub new_tier: Tier,
    pub streak: i32,
    pub streak_bonus: i32,
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium_explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub question_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub success: bool,
    pub message: String,
    pub review_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;
    use time::OffsetDateTime;

    #[test]
    fn public_question_hides_the_answer() {
        let q = Question {
            id: Uuid::new_v4(),
            question: "Who received the Torah at Sinai?".into(),
            options: vec!["Moshe".into(), "Aharon".into()],
            correct_answer: "Moshe".into(),
            explanation: "Moshe ascended Har Sinai.".into(),
            premium_explanation: None,
            sources: Some(Json(vec![Source {
                text: "And Moshe went up".into(),
                source: "Shemot 19:3".into(),
                commentary: None,
            }])),
            category: "Chumash".into(),
            subcategory: None,
            difficulty: "easy".into(),
            tier: Tier::Beginner,
            generated_by: None,
            created_at: OffsetDateTime::now_utc(),
        };

        let public = PublicQuestion::from(&q);
        let json = serde_json::to_string(&public).unwrap();
        assert!(json.contains("Who received the Torah"));
        assert!(!json.contains("correct_answer"));
    }
}
