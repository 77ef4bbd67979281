use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rand::seq::SliceRandom;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::auth::extractors::AuthUser;
use crate::llm::{LlmError, QuestionSpec};
use crate::profiles::repo::{Profile, QuotaOutcome};
use crate::questions::dto::{
    AnswerRequest, AnswerResponse, NextQuestionQuery, NextQuestionResponse, PublicQuestion,
    ReviewRequest, ReviewResponse,
};
use crate::questions::repo::{self, Question};
use crate::questions::CATEGORIES;
use crate::scoring;
use crate::state::AppState;

pub fn question_routes() -> Router<AppState> {
    Router::new()
        .route("/questions/next", get(next_question))
        .route("/questions/answer", post(answer_question))
        .route("/questions/review", post(submit_for_review))
}

#[instrument(skip(state))]
pub async fn next_question(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<NextQuestionQuery>,
) -> Result<Json<NextQuestionResponse>, (StatusCode, String)> {
    let today = OffsetDateTime::now_utc().date();
    let quota = Profile::consume_daily_question(
        &state.db,
        user_id,
        today,
        state.config.free_daily_limit,
    )
    .await
    .map_err(internal)?
    .ok_or((StatusCode::NOT_FOUND, "Profile not found".to_string()))?;

    let (profile, remaining_today) = match quota {
        QuotaOutcome::Allowed {
            profile,
            remaining_today,
        } => (profile, remaining_today),
        QuotaOutcome::Exceeded { limit } => {
            warn!(user_id = %user_id, limit, "daily question limit reached");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                format!("Daily limit of {limit} questions reached. Upgrade to Pro for unlimited questions."),
            ));
        }
    };

    let category = params
        .category
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| {
            CATEGORIES
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or("Chumash")
                .to_string()
        });

    let spec = QuestionSpec {
        category,
        subcategory: params.subcategory.filter(|s| !s.trim().is_empty()),
        difficulty: scoring::tier_difficulty(profile.tier).to_string(),
        tier: profile.tier,
        premium: profile.has_active_pro(),
    };

    let generated = state.generator.generate(&spec).await.map_err(|e| match e {
        LlmError::Invalid(msg) => {
            error!(error = %msg, "generator returned invalid question");
            (StatusCode::BAD_GATEWAY, "Invalid question format".to_string())
        }
        other => {
            error!(error = %other, "question generation failed");
            (
                StatusCode::BAD_GATEWAY,
                "Failed to generate question".to_string(),
            )
        }
    })?;

    let question = Question::insert_generated(&state.db, &generated, &spec, user_id)
        .await
        .map_err(internal)?;

    info!(user_id = %user_id, question_id = %question.id, category = %question.category, "question generated");
    Ok(Json(NextQuestionResponse {
        question: PublicQuestion::from(&question),
        question_id: question.id,
        questions_remaining_today: remaining_today,
    }))
}

#[instrument(skip(state, payload))]
pub async fn answer_question(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, (StatusCode, String)> {
    let question = Question::find(&state.db, payload.question_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Question not found".to_string()))?;

    let outcome = repo::record_solo_answer(&state.db, user_id, &question, &payload.selected_answer)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Profile not found".to_string()))?;

    info!(
        user_id = %user_id,
        question_id = %question.id,
        correct = outcome.correct,
        points = outcome.points_earned,
        "solo answer recorded"
    );

    let (premium_explanation, sources) = if outcome.premium {
        (
            question.premium_explanation.clone(),
            question.sources.clone().map(|s| s.0),
        )
    } else {
        (None, None)
    };

    Ok(Json(AnswerResponse {
        correct: outcome.correct,
        points_earned: outcome.points_earned,
        new_total_points: outcome.new_total_points,
        new_tier: outcome.new_tier,
        streak: outcome.streak,
        streak_bonus: outcome.streak_bonus,
        explanation: question.explanation,
        premium_explanation,
        sources,
    }))
}

#[instrument(skip(state, payload))]
pub async fn submit_for_review(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>, (StatusCode, String)> {
    if !Question::exists(&state.db, payload.question_id)
        .await
        .map_err(internal)?
    {
        return Err((StatusCode::NOT_FOUND, "Question not found".to_string()));
    }

    let review_id = repo::submit_review(&state.db, payload.question_id, user_id)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::BAD_REQUEST,
            "You have already submitted this question for review".to_string(),
        ))?;

    info!(user_id = %user_id, question_id = %payload.question_id, %review_id, "review submitted");
    Ok(Json(ReviewResponse {
        success: true,
        message: "Question submitted for Rabbinic Review".to_string(),
        review_id,
    }))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "question handler failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
