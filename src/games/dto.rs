use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::games::repo::{Game, GameAnswer, GameStatus};
use crate::questions::dto::PublicQuestion;

/// Game row as shown to its players, optionally with display names attached.
#[derive(Debug, Clone, Serialize)]
pub struct GameView {
    pub id: Uuid,
    pub game_code: String,
    pub status: GameStatus,
    pub player1_id: Uuid,
    pub player2_id: Option<Uuid>,
    pub player1_name: Option<String>,
    pub player2_name: Option<String>,
    pub player1_ready: bool,
    pub player2_ready: bool,
    pub player1_score: i32,
    pub player2_score: i32,
    pub current_question_index: i32,
    pub total_questions: i32,
    pub created_at: OffsetDateTime,
    pub started_at: Option<OffsetDateTime>,
    pub completed_at: Option<OffsetDateTime>,
}

impl GameView {
    pub fn bare(game: Game) -> Self {
        Self::with_names(game, None, None)
    }

    pub fn with_names(
        game: Game,
        player1_name: Option<String>,
        player2_name: Option<String>,
    ) -> Self {
        Self {
            id: game.id,
            game_code: game.game_code,
            status: game.status,
            player1_id: game.player1_id,
            player2_id: game.player2_id,
            player1_name,
            player2_name,
            player1_ready: game.player1_ready,
            player2_ready: game.player2_ready,
            player1_score: game.player1_score,
            player2_score: game.player2_score,
            current_question_index: game.current_question_index,
            total_questions: game.total_questions,
            created_at: game.created_at,
            started_at: game.started_at,
            completed_at: game.completed_at,
        }
    }
}

/// What the opponent sees of an answer: never the correct answer itself.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerAnswerView {
    pub user_id: Uuid,
    pub selected_answer: String,
    pub correct: bool,
    pub points_earned: i32,
}

impl From<GameAnswer> for PlayerAnswerView {
    fn from(a: GameAnswer) -> Self {
        Self {
            user_id: a.user_id,
            selected_answer: a.selected_answer,
            correct: a.correct,
            points_earned: a.points_earned,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateGameResponse {
    pub game: GameView,
    pub game_code: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinGameRequest {
    pub game_code: String,
}

#[derive(Debug, Serialize)]
pub struct JoinGameResponse {
    pub game: GameView,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub success: bool,
    pub game: GameView,
}

#[derive(Debug, Serialize)]
pub struct StartGameResponse {
    pub success: bool,
    pub questions_generated: i32,
}

#[derive(Debug, Serialize)]
pub struct GameStateResponse {
    pub game: GameView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<PublicQuestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player1_answer: Option<PlayerAnswerView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player2_answer: Option<PlayerAnswerView>,
}

#[derive(Debug, Deserialize)]
pub struct GameAnswerRequest {
    pub question_id: Uuid,
    pub selected_answer: String,
}

#[derive(Debug, Serialize)]
pub struct GameAnswerResponse {
    pub correct: bool,
    pub points_earned: i32,
    pub game: GameView,
}

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    pub game: GameView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<PublicQuestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player1_answer: Option<PlayerAnswerView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player2_answer: Option<PlayerAnswerView>,
    pub waiting_for_answers: bool,
    pub game_complete: bool,
}
