//! Repository for the `users` table.

use sqlx::PgPool;

use crate::models::user::{CreateUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "user_id, username, email, full_name, salted_password, disabled";

pub struct UserRepo;

impl UserRepo {
    /// Insert a new user with a generated id, returning the created row.
    ///
    /// A taken username fails on `uq_users_username`.
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (user_id, username, email, full_name, salted_password, disabled)
             VALUES (gen_random_uuid()::text, $1, $2, $3, $4, false)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.full_name)
            .bind(&input.salted_password)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, user_id: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE user_id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by username (case-sensitive).
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Set the `disabled` flag. Returns `true` if the user exists.
    pub async fn set_disabled(
        pool: &PgPool,
        user_id: &str,
        disabled: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET disabled = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(disabled)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
