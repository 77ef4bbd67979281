use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::{error, instrument};

use crate::auth::extractors::AuthUser;
use crate::profiles::dto::{ProfileResponse, WrongAnswerEntry};
use crate::profiles::repo::{PointsHistoryEntry, Profile, WrongAnswerRow};
use crate::state::AppState;

const WRONG_ANSWER_LIMIT: i64 = 50;
const POINTS_HISTORY_LIMIT: i64 = 100;

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profile", get(get_profile))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, (StatusCode, String)> {
    let profile = Profile::find(&state.db, user_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Profile not found".to_string()))?;

    let wrong_answers = WrongAnswerRow::list_recent(&state.db, user_id, WRONG_ANSWER_LIMIT)
        .await
        .map_err(internal)?
        .into_iter()
        .map(WrongAnswerEntry::from)
        .collect();

    let points_history = PointsHistoryEntry::list_recent(&state.db, user_id, POINTS_HISTORY_LIMIT)
        .await
        .map_err(internal)?;

    Ok(Json(ProfileResponse {
        profile,
        wrong_answers,
        points_history,
    }))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "profile query failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
