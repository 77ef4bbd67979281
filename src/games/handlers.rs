use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rand::seq::SliceRandom;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::extractors::AuthUser;
use crate::games::dto::{
    AdvanceResponse, CreateGameResponse, GameAnswerRequest, GameAnswerResponse, GameStateResponse,
    GameView, JoinGameRequest, JoinGameResponse, PlayerAnswerView, ReadyResponse,
    StartGameResponse,
};
use crate::games::repo::{AdvanceOutcome, AnswerOutcome, Game, GameStatus, JoinOutcome};
use crate::llm::QuestionSpec;
use crate::profiles::repo::Profile;
use crate::questions::dto::PublicQuestion;
use crate::questions::repo::Question;
use crate::questions::CATEGORIES;
use crate::scoring;
use crate::state::AppState;

pub fn game_routes() -> Router<AppState> {
    Router::new()
        .route("/games", post(create_game))
        .route("/games/join", post(join_game))
        .route("/games/:id", get(get_game_state))
        .route("/games/:id/ready", post(mark_ready))
        .route("/games/:id/start", post(start_game))
        .route("/games/:id/answer", post(submit_answer))
        .route("/games/:id/advance", post(advance_game))
}

/// Head-to-head play is a pro feature.
async fn require_pro(state: &AppState, user_id: Uuid) -> Result<Profile, (StatusCode, String)> {
    let profile = Profile::find(&state.db, user_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Profile not found".to_string()))?;

    if !profile.has_active_pro() {
        warn!(user_id = %user_id, "non-pro user attempted head-to-head");
        return Err((
            StatusCode::FORBIDDEN,
            "Head-to-head games are only available for Pro members. Please upgrade to Pro."
                .to_string(),
        ));
    }
    Ok(profile)
}

async fn load_game_for_player(
    state: &AppState,
    game_id: Uuid,
    user_id: Uuid,
) -> Result<Game, (StatusCode, String)> {
    let game = Game::find(&state.db, game_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Game not found".to_string()))?;

    if !game.is_player(user_id) {
        warn!(user_id = %user_id, game_id = %game.id, "non-player accessed game");
        return Err((
            StatusCode::FORBIDDEN,
            "You are not a player in this game".to_string(),
        ));
    }
    Ok(game)
}

#[instrument(skip(state))]
pub async fn create_game(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<CreateGameResponse>, (StatusCode, String)> {
    require_pro(&state, user_id).await?;

    let game = Game::create(&state.db, user_id, state.config.game_question_count)
        .await
        .map_err(internal)?;

    info!(user_id = %user_id, game_id = %game.id, code = %game.game_code, "game created");
    let game_code = game.game_code.clone();
    Ok(Json(CreateGameResponse {
        game: GameView::bare(game),
        game_code,
    }))
}

#[instrument(skip(state, payload))]
pub async fn join_game(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<JoinGameRequest>,
) -> Result<Json<JoinGameResponse>, (StatusCode, String)> {
    require_pro(&state, user_id).await?;

    let code = payload.game_code.trim().to_uppercase();
    if code.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Game code is required".to_string()));
    }

    match Game::try_join(&state.db, &code, user_id)
        .await
        .map_err(internal)?
    {
        JoinOutcome::Joined(game) => {
            info!(user_id = %user_id, game_id = %game.id, "player joined game");
            Ok(Json(JoinGameResponse {
                game: GameView::bare(game),
            }))
        }
        JoinOutcome::NotFound => Err((
            StatusCode::NOT_FOUND,
            "Game not found. Please check the game code.".to_string(),
        )),
        JoinOutcome::Closed => Err((
            StatusCode::BAD_REQUEST,
            "This game is no longer accepting players.".to_string(),
        )),
        JoinOutcome::OwnGame => Err((
            StatusCode::BAD_REQUEST,
            "You cannot join your own game.".to_string(),
        )),
        JoinOutcome::Full => Err((
            StatusCode::BAD_REQUEST,
            "This game is already full.".to_string(),
        )),
    }
}

#[instrument(skip(state))]
pub async fn get_game_state(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(game_id): Path<Uuid>,
) -> Result<Json<GameStateResponse>, (StatusCode, String)> {
    let game = load_game_for_player(&state, game_id, user_id).await?;

    let player1_name = Profile::display_name_of(&state.db, game.player1_id)
        .await
        .map_err(internal)?;
    let player2_name = match game.player2_id {
        Some(p2) => Profile::display_name_of(&state.db, p2)
            .await
            .map_err(internal)?,
        None => None,
    };

    let mut current_question = None;
    let mut question_id = None;
    let mut player1_answer = None;
    let mut player2_answer = None;

    if game.status == GameStatus::Active && game.current_question_index < game.total_questions {
        if let Some((question, _points)) =
            Game::question_at(&state.db, game.id, game.current_question_index)
                .await
                .map_err(internal)?
        {
            question_id = Some(question.id);
            current_question = Some(PublicQuestion::from(&question));

            let answers = Game::answers_for(&state.db, game.id, question.id)
                .await
                .map_err(internal)?;
            for answer in answers {
                if answer.user_id == game.player1_id {
                    player1_answer = Some(PlayerAnswerView::from(answer));
                } else if game.player2_id == Some(answer.user_id) {
                    player2_answer = Some(PlayerAnswerView::from(answer));
                }
            }
        }
    }

    Ok(Json(GameStateResponse {
        game: GameView::with_names(game, player1_name, player2_name),
        current_question,
        question_id,
        player1_answer,
        player2_answer,
    }))
}

#[instrument(skip(state))]
pub async fn mark_ready(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(game_id): Path<Uuid>,
) -> Result<Json<ReadyResponse>, (StatusCode, String)> {
    load_game_for_player(&state, game_id, user_id).await?;

    let game = Game::mark_ready(&state.db, game_id, user_id)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::BAD_REQUEST,
            "Game is not in waiting status".to_string(),
        ))?;

    info!(user_id = %user_id, game_id = %game.id, "player ready");
    Ok(Json(ReadyResponse {
        success: true,
        game: GameView::bare(game),
    }))
}

#[instrument(skip(state))]
pub async fn start_game(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(game_id): Path<Uuid>,
) -> Result<Json<StartGameResponse>, (StatusCode, String)> {
    let game = load_game_for_player(&state, game_id, user_id).await?;

    if game.status != GameStatus::Waiting || game.player2_id.is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Game is not ready to start. Both players must join first.".to_string(),
        ));
    }
    if !(game.player1_ready && game.player2_ready) {
        return Err((
            StatusCode::BAD_REQUEST,
            "Both players must be ready before starting.".to_string(),
        ));
    }

    // Winner of this update owns question generation; a concurrent start
    // attempt loses and reports the game as already started.
    let game = Game::try_start(&state.db, game_id)
        .await
        .map_err(internal)?
        .ok_or((
            StatusCode::BAD_REQUEST,
            "Game has already been started".to_string(),
        ))?;

    match generate_question_set(&state, &game, user_id).await {
        Ok(count) => {
            info!(game_id = %game.id, questions = count, "game started");
            Ok(Json(StartGameResponse {
                success: true,
                questions_generated: count,
            }))
        }
        Err(e) => {
            error!(error = %e, game_id = %game.id, "question generation failed; reverting start");
            if let Err(revert_err) = Game::revert_start(&state.db, game.id).await {
                error!(error = %revert_err, game_id = %game.id, "revert failed");
            }
            Err((
                StatusCode::BAD_GATEWAY,
                "Failed to generate questions for the game. Please try again.".to_string(),
            ))
        }
    }
}

/// Generate and attach the game's question set: tiers spread Jeopardy-style,
/// categories rotating through the shuffled list.
async fn generate_question_set(
    state: &AppState,
    game: &Game,
    generated_by: Uuid,
) -> anyhow::Result<i32> {
    let mut categories: Vec<&str> = CATEGORIES.to_vec();
    let mut tiers = scoring::game_tier_distribution().to_vec();
    {
        let mut rng = rand::thread_rng();
        categories.shuffle(&mut rng);
        tiers.shuffle(&mut rng);
    }

    let mut generated = 0;
    for i in 0..game.total_questions {
        let category = categories[i as usize % categories.len()];
        let tier = tiers[i as usize % tiers.len()];
        let spec = QuestionSpec {
            category: category.to_string(),
            subcategory: None,
            difficulty: scoring::tier_difficulty(tier).to_string(),
            tier,
            premium: false,
        };

        let question = state.generator.generate(&spec).await?;
        let saved = Question::insert_generated(&state.db, &question, &spec, generated_by).await?;
        Game::attach_question(
            &state.db,
            game.id,
            saved.id,
            i,
            category,
            scoring::question_points(tier),
        )
        .await?;
        generated += 1;
    }
    Ok(generated)
}

#[instrument(skip(state, payload))]
pub async fn submit_answer(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(game_id): Path<Uuid>,
    Json(payload): Json<GameAnswerRequest>,
) -> Result<Json<GameAnswerResponse>, (StatusCode, String)> {
    let game = load_game_for_player(&state, game_id, user_id).await?;
    if game.status != GameStatus::Active {
        return Err((StatusCode::BAD_REQUEST, "Game is not active".to_string()));
    }

    match Game::record_answer(
        &state.db,
        game_id,
        user_id,
        payload.question_id,
        &payload.selected_answer,
    )
    .await
    .map_err(internal)?
    {
        AnswerOutcome::Recorded {
            game,
            correct,
            points_earned,
        } => {
            info!(
                user_id = %user_id,
                game_id = %game.id,
                question_id = %payload.question_id,
                correct,
                points_earned,
                "game answer recorded"
            );
            Ok(Json(GameAnswerResponse {
                correct,
                points_earned,
                game: GameView::bare(game),
            }))
        }
        AnswerOutcome::NotActive => {
            Err((StatusCode::BAD_REQUEST, "Game is not active".to_string()))
        }
        AnswerOutcome::QuestionNotInGame => Err((
            StatusCode::NOT_FOUND,
            "Game question not found".to_string(),
        )),
        AnswerOutcome::AlreadyAnswered => Err((
            StatusCode::CONFLICT,
            "You have already answered this question".to_string(),
        )),
    }
}

#[instrument(skip(state))]
pub async fn advance_game(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(game_id): Path<Uuid>,
) -> Result<Json<AdvanceResponse>, (StatusCode, String)> {
    let game = load_game_for_player(&state, game_id, user_id).await?;
    if game.status == GameStatus::Waiting {
        return Err((StatusCode::BAD_REQUEST, "Game is not active".to_string()));
    }

    let outcome = Game::advance(&state.db, game_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Game not found".to_string()))?;

    match outcome {
        AdvanceOutcome::NotActive => {
            Err((StatusCode::BAD_REQUEST, "Game is not active".to_string()))
        }
        AdvanceOutcome::Complete(game) => Ok(Json(AdvanceResponse {
            game: GameView::bare(game),
            current_question: None,
            question_id: None,
            player1_answer: None,
            player2_answer: None,
            waiting_for_answers: false,
            game_complete: true,
        })),
        AdvanceOutcome::Advanced(game) => {
            let next = Game::question_at(&state.db, game.id, game.current_question_index)
                .await
                .map_err(internal)?;
            let (current_question, question_id) = match next {
                Some((q, _points)) => (Some(PublicQuestion::from(&q)), Some(q.id)),
                None => (None, None),
            };
            Ok(Json(AdvanceResponse {
                game: GameView::bare(game),
                current_question,
                question_id,
                player1_answer: None,
                player2_answer: None,
                waiting_for_answers: false,
                game_complete: false,
            }))
        }
        AdvanceOutcome::Waiting(game) => {
            let mut current_question = None;
            let mut question_id = None;
            let mut player1_answer = None;
            let mut player2_answer = None;

            if let Some((question, _points)) =
                Game::question_at(&state.db, game.id, game.current_question_index)
                    .await
                    .map_err(internal)?
            {
                question_id = Some(question.id);
                current_question = Some(PublicQuestion::from(&question));
                let answers = Game::answers_for(&state.db, game.id, question.id)
                    .await
                    .map_err(internal)?;
                for answer in answers {
                    if answer.user_id == game.player1_id {
                        player1_answer = Some(PlayerAnswerView::from(answer));
                    } else if game.player2_id == Some(answer.user_id) {
                        player2_answer = Some(PlayerAnswerView::from(answer));
                    }
                }
            }

            Ok(Json(AdvanceResponse {
                game: GameView::bare(game),
                current_question,
                question_id,
                player1_answer,
                player2_answer,
                waiting_for_answers: true,
                game_complete: false,
            }))
        }
    }
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "game handler failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
