use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::profiles::repo::{PointsHistoryEntry, Profile, WrongAnswerRow};

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: Profile,
    pub wrong_answers: Vec<WrongAnswerEntry>,
    pub points_history: Vec<PointsHistoryEntry>,
}

/// One question the user got wrong, with enough context to review it.
#[derive(Debug, Serialize)]
pub struct WrongAnswerEntry {
    pub id: Uuid,
    pub selected_answer: String,
    pub created_at: OffsetDateTime,
    pub question: AnsweredQuestion,
}

#[derive(Debug, Serialize)]
pub struct AnsweredQuestion {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
    pub category: String,
    pub difficulty: String,
}

impl From<WrongAnswerRow> for WrongAnswerEntry {
    fn from(row: WrongAnswerRow) -> Self {
        Self {
            id: row.id,
            selected_answer: row.selected_answer,
            created_at: row.created_at,
            question: AnsweredQuestion {
                id: row.question_id,
                question: row.question,
                options: row.options,
                correct_answer: row.correct_answer,
                explanation: row.explanation,
                category: row.category,
                difficulty: row.difficulty,
            },
        }
    }
}
