//! Category repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::event::Category;
use crate::utils::errors::MaabaraError;

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: PgPool,
}

impl CategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new category
    pub async fn create(&self, name: &str, slug: &str, description: Option<&str>) -> Result<Category, MaabaraError> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, slug, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, name, slug, description, created_at, updated_at
            "#
        )
        .bind(name)
        .bind(slug)
        .bind(description)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    /// Find category by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Category>, MaabaraError> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description, created_at, updated_at FROM categories WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Update category
    pub async fn update(&self, id: i64, name: Option<&str>, slug: Option<&str>, description: Option<&str>) -> Result<Category, MaabaraError> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                description = COALESCE($4, description),
                updated_at = $5
            WHERE id = $1
            RETURNING id, name, slug, description, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(name)
        .bind(slug)
        .bind(description)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(MaabaraError::CategoryNotFound { category_id: id })?;

        Ok(category)
    }

    /// Delete category; events in it become uncategorised
    pub async fn delete(&self, id: i64) -> Result<(), MaabaraError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MaabaraError::CategoryNotFound { category_id: id });
        }

        Ok(())
    }

    /// List all categories by name
    pub async fn list(&self) -> Result<Vec<Category>, MaabaraError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description, created_at, updated_at FROM categories ORDER BY name ASC"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }
}
