use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite};

use crate::UserId;

use super::Store;

#[derive(Debug, Clone)]
pub struct Account {
    pub user_id: UserId,
    pub username: String,
    pub password_hash: String,
}

impl Store {
    /// Inserts a new account. Returns `None` when the username is already
    /// taken (compared case-insensitively).
    pub async fn create_user(&self, username: &str, password_hash: &str) -> sqlx::Result<Option<UserId>> {
        let result = sqlx::query_as::<_, (UserId,)>(
            "INSERT INTO users (username,password_hash) VALUES (?,?) RETURNING user_id",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.db_pool)
        .await;

        match result {
            Ok((user_id,)) => Ok(Some(user_id)),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn delete_user(&self, user_id: UserId) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM users WHERE user_id=?")
            .bind(user_id)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }

    pub async fn find_account(&self, username: &str) -> sqlx::Result<Option<Account>> {
        let row: Option<(UserId, String, String)> =
            sqlx::query_as("SELECT user_id,username,password_hash FROM users WHERE username=?")
                .bind(username)
                .fetch_optional(&self.db_pool)
                .await?;

        Ok(row.map(|(user_id, username, password_hash)| Account { user_id, username, password_hash }))
    }

    /// Batch lookup of display names. Unknown ids are simply absent.
    pub async fn usernames_of(&self, user_ids: &[UserId]) -> sqlx::Result<HashMap<UserId, String>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT user_id,username FROM users WHERE user_id IN (");
        let mut ids = query.separated(",");
        for user_id in user_ids {
            ids.push_bind(*user_id);
        }
        ids.push_unseparated(")");

        let rows: Vec<(UserId, String)> = query.build_query_as().fetch_all(&self.db_pool).await?;
        Ok(rows.into_iter().collect())
    }
}
