//! # User Repository
//!
//! Operators referenced by sales and ledger entries. Credentials live with
//! the external authentication layer, not here.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use super::generate_id;
use crate::error::DbResult;
use tienda_core::{User, UserRole};

const USER_COLUMNS: &str = "id, username, display_name, role, is_active, created_at";

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(user)
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn create(&self, username: &str, display_name: &str, role: UserRole) -> DbResult<User> {
        let user = User {
            id: generate_id(),
            username: username.trim().to_lowercase(),
            display_name: display_name.trim().to_string(),
            role,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, username, display_name, role, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db
            .users()
            .create("Cajero1", "Cajero Uno", UserRole::Cashier)
            .await
            .unwrap();

        let by_name = db.users().get_by_username("cajero1").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        assert_eq!(by_name.role, UserRole::Cashier);
        assert!(db.users().get_by_id("missing").await.unwrap().is_none());
    }
}
