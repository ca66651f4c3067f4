use super::Database;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    /// Slash separated path from the root, e.g. `مسلسلات/تركية`.
    pub full_path: String,
}

impl Database {
    pub async fn add_category(
        &self,
        name: &str,
        parent_id: Option<i64>,
    ) -> Result<Category, sqlx::Error> {
        let name = name.trim();
        let full_path = match parent_id {
            Some(parent_id) => match self.category(parent_id).await? {
                Some(parent) => format!("{}/{}", parent.full_path, name),
                None => return Err(sqlx::Error::RowNotFound),
            },
            None => name.to_string(),
        };

        sqlx::query_as(
            "INSERT INTO categories (name, parent_id, full_path) VALUES (?, ?, ?)
             RETURNING id, name, parent_id, full_path",
        )
        .bind(name)
        .bind(parent_id)
        .bind(full_path)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn category(&self, id: i64) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as("SELECT id, name, parent_id, full_path FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Every category, ordered by path so children follow their parent.
    pub async fn all_categories(&self) -> Result<Vec<Category>, sqlx::Error> {
        sqlx::query_as("SELECT id, name, parent_id, full_path FROM categories ORDER BY full_path")
            .fetch_all(&self.pool)
            .await
    }

    /// Children of `parent_id`, or the root categories for `None`.
    pub async fn child_categories(
        &self,
        parent_id: Option<i64>,
    ) -> Result<Vec<Category>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, parent_id, full_path FROM categories
             WHERE parent_id IS ? ORDER BY name",
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Deletes the category, its subcategories and every video filed under
    /// any of them. Returns the number of videos removed.
    pub async fn delete_category(&self, id: i64) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let videos = sqlx::query(
            "WITH RECURSIVE tree(id) AS (
                 SELECT ?
                 UNION ALL
                 SELECT c.id FROM categories c JOIN tree t ON c.parent_id = t.id
             )
             DELETE FROM video_archive WHERE category_id IN (SELECT id FROM tree)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(videos)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{database, insert_video};

    #[tokio::test]
    async fn subcategory_path_includes_parent() {
        let db = database().await;
        let series = db.add_category("مسلسلات", None).await.unwrap();
        let turkish = db.add_category(" تركية ", Some(series.id)).await.unwrap();

        assert_eq!(turkish.name, "تركية");
        assert_eq!(turkish.full_path, "مسلسلات/تركية");
        assert_eq!(turkish.parent_id, Some(series.id));

        let roots = db.child_categories(None).await.unwrap();
        assert_eq!(roots, vec![series.clone()]);
        let children = db.child_categories(Some(series.id)).await.unwrap();
        assert_eq!(children, vec![turkish]);
    }

    #[tokio::test]
    async fn unknown_parent_is_rejected() {
        let db = database().await;
        let result = db.add_category("orphan", Some(42)).await;
        assert!(matches!(result, Err(sqlx::Error::RowNotFound)));
    }

    #[tokio::test]
    async fn deleting_a_category_removes_its_tree_and_videos() {
        let db = database().await;
        let root = db.add_category("Movies", None).await.unwrap();
        let child = db.add_category("Action", Some(root.id)).await.unwrap();
        let other = db.add_category("Docs", None).await.unwrap();
        insert_video(&db, 1, "a", Some(root.id)).await;
        insert_video(&db, 2, "b", Some(child.id)).await;
        let kept = insert_video(&db, 3, "c", Some(other.id)).await;

        assert_eq!(db.delete_category(root.id).await.unwrap(), 2);
        assert!(db.category(child.id).await.unwrap().is_none());
        assert!(db.video(kept).await.unwrap().is_some());
        assert_eq!(db.all_categories().await.unwrap(), vec![other]);
    }
}
