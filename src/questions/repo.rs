use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::llm::{GeneratedQuestion, QuestionSpec};
use crate::profiles::repo::{Profile, Tier};
use crate::questions::dto::Source;
use crate::scoring;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
    pub premium_explanation: Option<String>,
    pub sources: Option<Json<Vec<Source>>>,
    pub category: String,
    pub subcategory: Option<String>,
    pub difficulty: String,
    pub tier: Tier,
    pub generated_by: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

const QUESTION_COLUMNS: &str = r#"
    id, question, options, correct_answer, explanation, premium_explanation,
    sources, category, subcategory, difficulty, tier, generated_by, created_at
"#;

impl Question {
    pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Question>> {
        let question = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(question)
    }

    /// Persist a freshly generated question.
    pub async fn insert_generated(
        db: &PgPool,
        generated: &GeneratedQuestion,
        spec: &QuestionSpec,
        generated_by: Uuid,
    ) -> anyhow::Result<Question> {
        let question = sqlx::query_as::<_, Question>(&format!(
            r#"
            INSERT INTO questions
                (question, options, correct_answer, explanation, premium_explanation,
                 sources, category, subcategory, difficulty, tier, generated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(&generated.question)
        .bind(&generated.options)
        .bind(&generated.correct_answer)
        .bind(&generated.explanation)
        .bind(&generated.premium_explanation)
        .bind(generated.sources.clone().map(Json))
        .bind(&spec.category)
        .bind(&spec.subcategory)
        .bind(&spec.difficulty)
        .bind(spec.tier)
        .bind(generated_by)
        .fetch_one(db)
        .await?;
        Ok(question)
    }

    pub async fn exists(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row.is_some())
    }
}

/// Result of scoring a solo answer against the caller's profile.
#[derive(Debug, Clone)]
pub struct SoloOutcome {
    pub correct: bool,
    pub points_earned: i32,
    pub streak_bonus: i32,
    pub streak: i32,
    pub new_total_points: i32,
    pub new_tier: Tier,
    pub premium: bool,
}

/// Score a solo answer in one transaction: profile update, answer log and
/// points history move together or not at all.
pub async fn record_solo_answer(
    db: &PgPool,
    user_id: Uuid,
    question: &Question,
    selected_answer: &str,
) -> anyhow::Result<Option<SoloOutcome>> {
    let mut tx = db.begin().await?;

    let Some(profile) = Profile::find_for_update(&mut tx, user_id).await? else {
        return Ok(None);
    };

    let correct = selected_answer == question.correct_answer;
    let scored = scoring::score_answer(correct, profile.streak);
    let new_total_points = (profile.points + scored.points_earned).max(0);
    let new_tier = scoring::tier_for_points(new_total_points);

    sqlx::query(
        r#"
        UPDATE profiles
        SET points = $2, tier = $3, streak = $4,
            questions_answered = questions_answered + 1, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(new_total_points)
    .bind(new_tier)
    .bind(scored.new_streak)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO user_answers (user_id, question_id, selected_answer, correct, points_earned)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user_id)
    .bind(question.id)
    .bind(selected_answer)
    .bind(correct)
    .bind(scored.points_earned)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO points_history (user_id, points, points_change)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(user_id)
    .bind(new_total_points)
    .bind(scored.points_earned)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Some(SoloOutcome {
        correct,
        points_earned: scored.points_earned,
        streak_bonus: scored.streak_bonus,
        streak: scored.new_streak,
        new_total_points,
        new_tier,
        premium: profile.has_active_pro(),
    }))
}

/// Submit a question for rabbinic review. Returns None when the caller has
/// already submitted this question.
pub async fn submit_review(
    db: &PgPool,
    question_id: Uuid,
    submitted_by: Uuid,
) -> anyhow::Result<Option<Uuid>> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO rabbinic_reviews (question_id, submitted_by, review_status)
        VALUES ($1, $2, 'pending')
        ON CONFLICT (question_id, submitted_by) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(question_id)
    .bind(submitted_by)
    .fetch_optional(db)
    .await?;
    Ok(row.map(|r| r.0))
}
