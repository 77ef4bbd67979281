use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::scoring;

/// Named reward bracket derived from a user's point total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum Tier {
    Beginner,
    Student,
    Scholar,
    Chacham,
    Gadol,
}

/// Subscription level gating daily quota and premium features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Pro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    PastDue,
    Trialing,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub points: i32,
    pub tier: Tier,
    pub streak: i32,
    pub questions_answered: i32,
    pub plan: Plan,
    pub subscription_status: SubscriptionStatus,
    pub daily_questions_used: i32,
    pub daily_reset_date: Option<Date>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Outcome of consuming one generated question from the daily allowance.
#[derive(Debug)]
pub enum QuotaOutcome {
    Allowed {
        profile: Profile,
        remaining_today: Option<i32>,
    },
    Exceeded {
        limit: i32,
    },
}

const PROFILE_COLUMNS: &str = r#"
    id, display_name, points, tier, streak, questions_answered,
    plan, subscription_status, daily_questions_used, daily_reset_date,
    created_at, updated_at
"#;

impl Profile {
    /// Pro features require both the plan and a live subscription.
    pub fn has_active_pro(&self) -> bool {
        self.plan == Plan::Pro && self.subscription_status == SubscriptionStatus::Active
    }

    pub async fn find(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(profile)
    }

    /// Row-locked read for use inside a transaction that will update the profile.
    pub async fn find_for_update(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(profile)
    }

    pub async fn display_name_of(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<String>> {
        let name: Option<(Option<String>,)> =
            sqlx::query_as("SELECT display_name FROM profiles WHERE id = $1")
                .bind(user_id)
                .fetch_optional(db)
                .await?;
        Ok(name.and_then(|row| row.0))
    }

    pub async fn set_plan(
        db: &PgPool,
        user_id: Uuid,
        plan: Plan,
        status: SubscriptionStatus,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET plan = $2, subscription_status = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(plan)
        .bind(status)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically consume one question from the daily allowance, resetting the
    /// counter when the stored reset date is stale. Pro subscribers are not
    /// limited but their usage is still counted.
    pub async fn consume_daily_question(
        db: &PgPool,
        user_id: Uuid,
        today: Date,
        free_limit: i32,
    ) -> anyhow::Result<Option<QuotaOutcome>> {
        let mut tx = db.begin().await?;

        let Some(mut profile) = Profile::find_for_update(&mut tx, user_id).await? else {
            return Ok(None);
        };

        let used = if scoring::should_reset_daily(profile.daily_reset_date, today) {
            0
        } else {
            profile.daily_questions_used
        };

        if !profile.has_active_pro() && used >= free_limit {
            tx.rollback().await?;
            return Ok(Some(QuotaOutcome::Exceeded { limit: free_limit }));
        }

        sqlx::query(
            r#"
            UPDATE profiles
            SET daily_questions_used = $2, daily_reset_date = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(used + 1)
        .bind(today)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        profile.daily_questions_used = used + 1;
        profile.daily_reset_date = Some(today);
        let remaining_today = if profile.has_active_pro() {
            None
        } else {
            Some(free_limit - used - 1)
        };
        Ok(Some(QuotaOutcome::Allowed {
            profile,
            remaining_today,
        }))
    }
}

/// A wrong solo answer joined with the question it was given for.
#[derive(Debug, Clone, FromRow)]
pub struct WrongAnswerRow {
    pub id: Uuid,
    pub selected_answer: String,
    pub created_at: OffsetDateTime,
    pub question_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
    pub category: String,
    pub difficulty: String,
}

impl WrongAnswerRow {
    pub async fn list_recent(
        db: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> anyhow::Result<Vec<WrongAnswerRow>> {
        let rows = sqlx::query_as::<_, WrongAnswerRow>(
            r#"
            SELECT ua.id, ua.selected_answer, ua.created_at,
                   q.id AS question_id, q.question, q.options, q.correct_answer,
                   q.explanation, q.category, q.difficulty
            FROM user_answers ua
            JOIN questions q ON q.id = ua.question_id
            WHERE ua.user_id = $1 AND ua.correct = FALSE
            ORDER BY ua.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PointsHistoryEntry {
    pub id: Uuid,
    pub points: i32,
    pub points_change: i32,
    pub created_at: OffsetDateTime,
}

impl PointsHistoryEntry {
    /// Last 30 days of point movements, oldest first.
    pub async fn list_recent(
        db: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> anyhow::Result<Vec<PointsHistoryEntry>> {
        let rows = sqlx::query_as::<_, PointsHistoryEntry>(
            r#"
            SELECT id, points, points_change, created_at
            FROM points_history
            WHERE user_id = $1 AND created_at >= now() - interval '30 days'
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}
