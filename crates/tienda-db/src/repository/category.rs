//! # Category Repository
//!
//! Categories only matter here as the filter for bulk margin updates.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use super::generate_id;
use crate::error::DbResult;
use tienda_core::Category;

pub(crate) async fn exists(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM categories WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Creates a category and returns it.
    pub async fn create(&self, name: &str, description: Option<&str>) -> DbResult<Category> {
        let category = Category {
            id: generate_id(),
            name: name.trim().to_string(),
            description: description.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO categories (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.created_at)
        .execute(&self.pool)
        .await?;

        Ok(category)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_at FROM categories WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_create_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let drinks = db.categories().create("Drinks", None).await.unwrap();
        db.categories().create("Bakery", Some("Bread and pastries")).await.unwrap();

        let names: Vec<String> = db
            .categories()
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Bakery", "Drinks"]);
        assert!(db.categories().get_by_id(&drinks.id).await.unwrap().is_some());

        let dup = db.categories().create("Drinks", None).await;
        assert!(matches!(dup, Err(DbError::UniqueViolation { .. })));
    }
}
