use super::Database;

const ACTIVE_CATEGORY_KEY: &str = "active_category_id";

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RequiredChannel {
    pub channel_id: i64,
    pub channel_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotStats {
    pub videos: i64,
    pub categories: i64,
    pub users: i64,
    pub views: i64,
    pub ratings: i64,
    pub favorites: i64,
}

impl Database {
    /// Registers a user on first contact; later calls are no-ops.
    pub async fn add_bot_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        first_name: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO bot_users (user_id, username, first_name) VALUES (?, ?, ?)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(username)
        .bind(first_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn all_user_ids(&self) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT user_id FROM bot_users ORDER BY user_id")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn remove_bot_user(&self, user_id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for table in ["user_favorites", "user_history", "video_ratings", "bot_users"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE user_id = ?"))
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await
    }

    /// Category that newly archived videos are filed under.
    pub async fn active_category_id(&self) -> Result<Option<i64>, sqlx::Error> {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT setting_value FROM bot_settings WHERE setting_key = ?")
                .bind(ACTIVE_CATEGORY_KEY)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.flatten().and_then(|raw| raw.trim().parse().ok()))
    }

    pub async fn set_active_category_id(&self, category_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO bot_settings (setting_key, setting_value) VALUES (?, ?)
             ON CONFLICT (setting_key) DO UPDATE SET setting_value = excluded.setting_value",
        )
        .bind(ACTIVE_CATEGORY_KEY)
        .bind(category_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn add_required_channel(
        &self,
        channel_id: i64,
        channel_name: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO required_channels (channel_id, channel_name) VALUES (?, ?)
             ON CONFLICT (channel_id) DO UPDATE SET channel_name = excluded.channel_name",
        )
        .bind(channel_id)
        .bind(channel_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns `false` when the channel wasn't registered.
    pub async fn remove_required_channel(&self, channel_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM required_channels WHERE channel_id = ?")
            .bind(channel_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn required_channels(&self) -> Result<Vec<RequiredChannel>, sqlx::Error> {
        sqlx::query_as("SELECT channel_id, channel_name FROM required_channels ORDER BY channel_id")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn stats(&self) -> Result<BotStats, sqlx::Error> {
        Ok(BotStats {
            videos: self.count("SELECT COUNT(*) FROM video_archive").await?,
            categories: self.count("SELECT COUNT(*) FROM categories").await?,
            users: self.count("SELECT COUNT(*) FROM bot_users").await?,
            views: self
                .count("SELECT COALESCE(SUM(view_count), 0) FROM video_archive")
                .await?,
            ratings: self.count("SELECT COUNT(*) FROM video_ratings").await?,
            favorites: self.count("SELECT COUNT(*) FROM user_favorites").await?,
        })
    }

    async fn count(&self, sql: &'static str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(sql).fetch_one(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{database, insert_video};
    use super::*;

    #[tokio::test]
    async fn users_are_registered_once() {
        let db = database().await;
        db.add_bot_user(5, Some("alice"), "Alice").await.unwrap();
        db.add_bot_user(5, Some("alice2"), "Alice").await.unwrap();
        db.add_bot_user(3, None, "Bob").await.unwrap();

        assert_eq!(db.all_user_ids().await.unwrap(), vec![3, 5]);

        db.remove_bot_user(3).await.unwrap();
        assert_eq!(db.all_user_ids().await.unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn active_category_round_trips() {
        let db = database().await;
        assert_eq!(db.active_category_id().await.unwrap(), None);

        db.set_active_category_id(4).await.unwrap();
        db.set_active_category_id(9).await.unwrap();
        assert_eq!(db.active_category_id().await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn required_channels_can_be_added_and_removed() {
        let db = database().await;
        db.add_required_channel(-1001, "news").await.unwrap();
        db.add_required_channel(-1001, "news_renamed").await.unwrap();

        let channels = db.required_channels().await.unwrap();
        assert_eq!(
            channels,
            vec![RequiredChannel {
                channel_id: -1001,
                channel_name: "news_renamed".into()
            }]
        );

        assert!(db.remove_required_channel(-1001).await.unwrap());
        assert!(!db.remove_required_channel(-1001).await.unwrap());
    }

    #[tokio::test]
    async fn stats_count_everything() {
        let db = database().await;
        let id = insert_video(&db, 1, "a", None).await;
        db.increment_view_count(id).await.unwrap();
        db.add_bot_user(1, None, "u").await.unwrap();
        db.rate_video(id, 1, 4).await.unwrap();
        db.add_favorite(1, id).await.unwrap();

        let stats = db.stats().await.unwrap();
        assert_eq!(
            stats,
            BotStats {
                videos: 1,
                categories: 0,
                users: 1,
                views: 1,
                ratings: 1,
                favorites: 1,
            }
        );
    }
}
