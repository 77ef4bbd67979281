use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::games::code::generate_game_code;
use crate::questions::repo::Question;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Active,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Game {
    pub id: Uuid,
    pub game_code: String,
    pub player1_id: Uuid,
    pub player2_id: Option<Uuid>,
    pub created_by: Uuid,
    pub status: GameStatus,
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

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GameAnswer {
    pub id: Uuid,
    pub game_id: Uuid,
    pub question_id: Uuid,
    pub user_id: Uuid,
    pub selected_answer: String,
    pub correct: bool,
    pub points_earned: i32,
    pub created_at: OffsetDateTime,
}

#[derive(Debug)]
pub enum JoinOutcome {
    Joined(Game),
    NotFound,
    Closed,
    OwnGame,
    Full,
}

#[derive(Debug)]
pub enum AnswerOutcome {
    Recorded {
        game: Game,
        correct: bool,
        points_earned: i32,
    },
    NotActive,
    QuestionNotInGame,
    AlreadyAnswered,
}

#[derive(Debug)]
pub enum AdvanceOutcome {
    NotActive,
    Waiting(Game),
    Advanced(Game),
    Complete(Game),
}

const GAME_COLUMNS: &str = r#"
    id, game_code, player1_id, player2_id, created_by, status,
    player1_ready, player2_ready, player1_score, player2_score,
    current_question_index, total_questions, created_at, started_at, completed_at
"#;

const CODE_ATTEMPTS: usize = 10;

impl Game {
    pub fn is_player(&self, user_id: Uuid) -> bool {
        self.player1_id == user_id || self.player2_id == Some(user_id)
    }

    pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Game>> {
        let game = sqlx::query_as::<_, Game>(&format!(
            "SELECT {GAME_COLUMNS} FROM head_to_head_games WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(game)
    }

    /// Create a game with a fresh unique code. Uniqueness comes from the DB
    /// constraint; a code collision just means another roll of the dice.
    pub async fn create(db: &PgPool, creator: Uuid, total_questions: i32) -> anyhow::Result<Game> {
        for _ in 0..CODE_ATTEMPTS {
            let code = generate_game_code();
            let inserted = sqlx::query_as::<_, Game>(&format!(
                r#"
                INSERT INTO head_to_head_games (game_code, player1_id, created_by, total_questions)
                VALUES ($1, $2, $2, $3)
                ON CONFLICT (game_code) DO NOTHING
                RETURNING {GAME_COLUMNS}
                "#
            ))
            .bind(&code)
            .bind(creator)
            .bind(total_questions)
            .fetch_optional(db)
            .await?;

            if let Some(game) = inserted {
                return Ok(game);
            }
        }
        anyhow::bail!("could not allocate a unique game code after {CODE_ATTEMPTS} attempts")
    }

    /// Claim the player2 slot in a single conditional update. Only a waiting
    /// game with an empty slot created by someone else can be joined.
    pub async fn try_join(db: &PgPool, game_code: &str, user_id: Uuid) -> anyhow::Result<JoinOutcome> {
        let joined = sqlx::query_as::<_, Game>(&format!(
            r#"
            UPDATE head_to_head_games
            SET player2_id = $2
            WHERE game_code = $1
              AND status = 'waiting'
              AND player2_id IS NULL
              AND player1_id <> $2
            RETURNING {GAME_COLUMNS}
            "#
        ))
        .bind(game_code)
        .bind(user_id)
        .fetch_optional(db)
        .await?;

        if let Some(game) = joined {
            return Ok(JoinOutcome::Joined(game));
        }

        // Lost the update; fetch once to say why.
        let game = sqlx::query_as::<_, Game>(&format!(
            "SELECT {GAME_COLUMNS} FROM head_to_head_games WHERE game_code = $1"
        ))
        .bind(game_code)
        .fetch_optional(db)
        .await?;

        Ok(match game {
            None => JoinOutcome::NotFound,
            Some(g) if g.status != GameStatus::Waiting => JoinOutcome::Closed,
            Some(g) if g.player1_id == user_id => JoinOutcome::OwnGame,
            Some(_) => JoinOutcome::Full,
        })
    }

    /// Flag the calling player ready. Returns the updated game, or None when
    /// the game is not waiting or the caller is not one of its players.
    pub async fn mark_ready(db: &PgPool, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Game>> {
        let game = sqlx::query_as::<_, Game>(&format!(
            r#"
            UPDATE head_to_head_games
            SET player1_ready = CASE WHEN player1_id = $2 THEN TRUE ELSE player1_ready END,
                player2_ready = CASE WHEN player2_id = $2 THEN TRUE ELSE player2_ready END
            WHERE id = $1
              AND status = 'waiting'
              AND (player1_id = $2 OR player2_id = $2)
            RETURNING {GAME_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(game)
    }

    /// Atomically move a waiting game with two ready players to active. The
    /// winner of this update generates the question set; a concurrent second
    /// caller gets None.
    pub async fn try_start(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Game>> {
        let game = sqlx::query_as::<_, Game>(&format!(
            r#"
            UPDATE head_to_head_games
            SET status = 'active', started_at = now(), current_question_index = 0
            WHERE id = $1
              AND status = 'waiting'
              AND player2_id IS NOT NULL
              AND player1_ready AND player2_ready
            RETURNING {GAME_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(game)
    }

    /// Undo a failed start: drop any attached questions and put the game back
    /// in the lobby so the players can try again.
    pub async fn revert_start(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        let mut tx = db.begin().await?;
        sqlx::query("DELETE FROM head_to_head_game_questions WHERE game_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            UPDATE head_to_head_games
            SET status = 'waiting', started_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn attach_question(
        db: &PgPool,
        game_id: Uuid,
        question_id: Uuid,
        question_index: i32,
        category: &str,
        points: i32,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO head_to_head_game_questions
                (game_id, question_id, question_index, category, points)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(game_id)
        .bind(question_id)
        .bind(question_index)
        .bind(category)
        .bind(points)
        .execute(db)
        .await?;
        Ok(())
    }

    /// The question linked at a given index, with its point value.
    pub async fn question_at(
        db: &PgPool,
        game_id: Uuid,
        index: i32,
    ) -> anyhow::Result<Option<(Question, i32)>> {
        let link: Option<(Uuid, i32)> = sqlx::query_as(
            r#"
            SELECT question_id, points
            FROM head_to_head_game_questions
            WHERE game_id = $1 AND question_index = $2
            "#,
        )
        .bind(game_id)
        .bind(index)
        .fetch_optional(db)
        .await?;

        let Some((question_id, points)) = link else {
            return Ok(None);
        };
        let question = Question::find(db, question_id).await?;
        Ok(question.map(|q| (q, points)))
    }

    pub async fn answers_for(
        db: &PgPool,
        game_id: Uuid,
        question_id: Uuid,
    ) -> anyhow::Result<Vec<GameAnswer>> {
        let answers = sqlx::query_as::<_, GameAnswer>(
            r#"
            SELECT id, game_id, question_id, user_id, selected_answer, correct,
                   points_earned, created_at
            FROM head_to_head_game_answers
            WHERE game_id = $1 AND question_id = $2
            "#,
        )
        .bind(game_id)
        .bind(question_id)
        .fetch_all(db)
        .await?;
        Ok(answers)
    }

    /// Record one player's answer and bump their score in the same
    /// transaction. The unique constraint on (game, question, user) makes a
    /// second submission a no-op we can detect.
    pub async fn record_answer(
        db: &PgPool,
        game_id: Uuid,
        user_id: Uuid,
        question_id: Uuid,
        selected_answer: &str,
    ) -> anyhow::Result<AnswerOutcome> {
        let mut tx = db.begin().await?;

        let game = sqlx::query_as::<_, Game>(&format!(
            "SELECT {GAME_COLUMNS} FROM head_to_head_games WHERE id = $1 FOR UPDATE"
        ))
        .bind(game_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(game) = game else {
            return Ok(AnswerOutcome::QuestionNotInGame);
        };
        if game.status != GameStatus::Active {
            return Ok(AnswerOutcome::NotActive);
        }

        let link: Option<(i32,)> = sqlx::query_as(
            r#"
            SELECT points
            FROM head_to_head_game_questions
            WHERE game_id = $1 AND question_id = $2
            "#,
        )
        .bind(game_id)
        .bind(question_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((points,)) = link else {
            return Ok(AnswerOutcome::QuestionNotInGame);
        };

        let correct_answer: Option<(String,)> =
            sqlx::query_as("SELECT correct_answer FROM questions WHERE id = $1")
                .bind(question_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((correct_answer,)) = correct_answer else {
            return Ok(AnswerOutcome::QuestionNotInGame);
        };

        let correct = selected_answer == correct_answer;
        let points_earned = if correct { points } else { 0 };

        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO head_to_head_game_answers
                (game_id, question_id, user_id, selected_answer, correct, points_earned)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (game_id, question_id, user_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(game_id)
        .bind(question_id)
        .bind(user_id)
        .bind(selected_answer)
        .bind(correct)
        .bind(points_earned)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            return Ok(AnswerOutcome::AlreadyAnswered);
        }

        let game = sqlx::query_as::<_, Game>(&format!(
            r#"
            UPDATE head_to_head_games
            SET player1_score = CASE WHEN player1_id = $2 THEN player1_score + $3 ELSE player1_score END,
                player2_score = CASE WHEN player2_id = $2 THEN player2_score + $3 ELSE player2_score END
            WHERE id = $1
            RETURNING {GAME_COLUMNS}
            "#
        ))
        .bind(game_id)
        .bind(user_id)
        .bind(points_earned)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(AnswerOutcome::Recorded {
            game,
            correct,
            points_earned,
        })
    }

    /// Advance past the current question once both players have answered it,
    /// completing the game when the last question is done. Runs under a row
    /// lock so concurrent calls from both players advance exactly once.
    pub async fn advance(db: &PgPool, game_id: Uuid) -> anyhow::Result<Option<AdvanceOutcome>> {
        let mut tx = db.begin().await?;

        let game = sqlx::query_as::<_, Game>(&format!(
            "SELECT {GAME_COLUMNS} FROM head_to_head_games WHERE id = $1 FOR UPDATE"
        ))
        .bind(game_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(game) = game else {
            return Ok(None);
        };

        if game.status == GameStatus::Completed {
            return Ok(Some(AdvanceOutcome::Complete(game)));
        }
        if game.status != GameStatus::Active {
            return Ok(Some(AdvanceOutcome::NotActive));
        }

        if game.current_question_index >= game.total_questions {
            let game = Self::complete_in_tx(&mut tx, game_id).await?;
            tx.commit().await?;
            return Ok(Some(AdvanceOutcome::Complete(game)));
        }

        let link: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT question_id
            FROM head_to_head_game_questions
            WHERE game_id = $1 AND question_index = $2
            "#,
        )
        .bind(game_id)
        .bind(game.current_question_index)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((question_id,)) = link else {
            // Question set missing; surface as waiting so clients re-poll.
            return Ok(Some(AdvanceOutcome::Waiting(game)));
        };

        let answered: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT user_id
            FROM head_to_head_game_answers
            WHERE game_id = $1 AND question_id = $2
            "#,
        )
        .bind(game_id)
        .bind(question_id)
        .fetch_all(&mut *tx)
        .await?;

        let p1_answered = answered.iter().any(|(u,)| *u == game.player1_id);
        let p2_answered = game
            .player2_id
            .map(|p2| answered.iter().any(|(u,)| *u == p2))
            .unwrap_or(false);

        if !(p1_answered && p2_answered) {
            return Ok(Some(AdvanceOutcome::Waiting(game)));
        }

        let next_index = game.current_question_index + 1;
        if next_index >= game.total_questions {
            sqlx::query(
                r#"
                UPDATE head_to_head_games
                SET current_question_index = $2
                WHERE id = $1
                "#,
            )
            .bind(game_id)
            .bind(next_index)
            .execute(&mut *tx)
            .await?;
            let game = Self::complete_in_tx(&mut tx, game_id).await?;
            tx.commit().await?;
            return Ok(Some(AdvanceOutcome::Complete(game)));
        }

        let game = sqlx::query_as::<_, Game>(&format!(
            r#"
            UPDATE head_to_head_games
            SET current_question_index = $2
            WHERE id = $1
            RETURNING {GAME_COLUMNS}
            "#
        ))
        .bind(game_id)
        .bind(next_index)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(AdvanceOutcome::Advanced(game)))
    }

    async fn complete_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        game_id: Uuid,
    ) -> anyhow::Result<Game> {
        let game = sqlx::query_as::<_, Game>(&format!(
            r#"
            UPDATE head_to_head_games
            SET status = 'completed', completed_at = now()
            WHERE id = $1
            RETURNING {GAME_COLUMNS}
            "#
        ))
        .bind(game_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(game)
    }
}
