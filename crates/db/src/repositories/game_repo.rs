//! Repository for `game_metadata` and `authorization_scheme`.

use sqlx::PgPool;

use crate::models::game::{CreateGame, Game};

const COLUMNS: &str = "g.game_id, g.data, g.thumbnail_key, g.video_key";

pub struct GameRepo;

impl GameRepo {
    /// Insert a game and authorize its owner, in one transaction.
    pub async fn create(
        pool: &PgPool,
        input: &CreateGame,
        owner_id: &str,
    ) -> Result<Game, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let game = sqlx::query_as::<_, Game>(
            "INSERT INTO game_metadata (game_id, data, thumbnail_key, video_key)
             VALUES ($1, $2, $3, $4)
             RETURNING game_id, data, thumbnail_key, video_key",
        )
        .bind(&input.game_id)
        .bind(&input.data)
        .bind(&input.thumbnail_key)
        .bind(&input.video_key)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO authorization_scheme (game_id, user_id) VALUES ($1, $2)")
            .bind(&game.game_id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(game)
    }

    /// Grant `user_id` access to an existing game. Idempotent.
    pub async fn authorize(pool: &PgPool, game_id: &str, user_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO authorization_scheme (game_id, user_id) VALUES ($1, $2)
             ON CONFLICT (game_id, user_id) DO NOTHING",
        )
        .bind(game_id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find a game the user is authorized for.
    ///
    /// Returns `None` both for unknown games and for games the user cannot see.
    pub async fn find_for_user(
        pool: &PgPool,
        game_id: &str,
        user_id: &str,
    ) -> Result<Option<Game>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM game_metadata g
             JOIN authorization_scheme a ON a.game_id = g.game_id
             WHERE g.game_id = $1 AND a.user_id = $2"
        );
        sqlx::query_as::<_, Game>(&query)
            .bind(game_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// List every game the user is authorized for.
    pub async fn list_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<Game>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM game_metadata g
             JOIN authorization_scheme a ON a.game_id = g.game_id
             WHERE a.user_id = $1
             ORDER BY g.game_id"
        );
        sqlx::query_as::<_, Game>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }
}
