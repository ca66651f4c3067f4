use super::videos::VIDEO_COLUMNS;
use super::{now_timestamp, page_offset, Database, Page, VideoRow, VIDEOS_PER_PAGE};

const POPULAR_LIMIT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopularKind {
    MostViewed,
    HighestRated,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatingStats {
    /// `None` until someone rates the video.
    pub average: Option<f64>,
    pub count: i64,
}

impl Database {
    /// Returns `true` when the video wasn't a favorite before.
    pub async fn add_favorite(&self, user_id: i64, video_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO user_favorites (user_id, video_id, added_at) VALUES (?, ?, ?)
             ON CONFLICT (user_id, video_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(video_id)
        .bind(now_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_favorite(&self, user_id: i64, video_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_favorites WHERE user_id = ? AND video_id = ?")
            .bind(user_id)
            .bind(video_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn is_favorite(&self, user_id: i64, video_id: i64) -> Result<bool, sqlx::Error> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_favorites WHERE user_id = ? AND video_id = ?")
                .bind(user_id)
                .bind(video_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    pub async fn favorites(&self, user_id: i64, page: u32) -> Result<Page<VideoRow>, sqlx::Error> {
        let items = sqlx::query_as(&format!(
            "SELECT {VIDEO_COLUMNS} FROM video_archive
             JOIN user_favorites ON user_favorites.video_id = video_archive.id
             WHERE user_favorites.user_id = ?
             ORDER BY user_favorites.added_at DESC LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(i64::from(VIDEOS_PER_PAGE))
        .bind(page_offset(page))
        .fetch_all(&self.pool)
        .await?;
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM user_favorites WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(Page { items, total, page })
    }

    /// Stores or replaces the user's rating. `rating` must be within 1..=5.
    pub async fn rate_video(
        &self,
        video_id: i64,
        user_id: i64,
        rating: u8,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO video_ratings (video_id, user_id, rating, rated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (video_id, user_id) DO UPDATE SET
                 rating = excluded.rating,
                 rated_at = excluded.rated_at",
        )
        .bind(video_id)
        .bind(user_id)
        .bind(i64::from(rating))
        .bind(now_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn user_rating(&self, video_id: i64, user_id: i64) -> Result<Option<u8>, sqlx::Error> {
        let rating: Option<i64> =
            sqlx::query_scalar("SELECT rating FROM video_ratings WHERE video_id = ? AND user_id = ?")
                .bind(video_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(rating.and_then(|r| u8::try_from(r).ok()))
    }

    pub async fn rating_stats(&self, video_id: i64) -> Result<RatingStats, sqlx::Error> {
        let (average, count): (Option<f64>, i64) =
            sqlx::query_as("SELECT AVG(rating), COUNT(*) FROM video_ratings WHERE video_id = ?")
                .bind(video_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(RatingStats { average, count })
    }

    /// Moves the video to the top of the user's watch history.
    pub async fn record_view(&self, user_id: i64, video_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_history (user_id, video_id, last_watched) VALUES (?, ?, ?)
             ON CONFLICT (user_id, video_id) DO UPDATE SET last_watched = excluded.last_watched",
        )
        .bind(user_id)
        .bind(video_id)
        .bind(now_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn history(&self, user_id: i64, page: u32) -> Result<Page<VideoRow>, sqlx::Error> {
        let items = sqlx::query_as(&format!(
            "SELECT {VIDEO_COLUMNS} FROM video_archive
             JOIN user_history ON user_history.video_id = video_archive.id
             WHERE user_history.user_id = ?
             ORDER BY user_history.last_watched DESC LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(i64::from(VIDEOS_PER_PAGE))
        .bind(page_offset(page))
        .fetch_all(&self.pool)
        .await?;
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM user_history WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(Page { items, total, page })
    }

    pub async fn popular_videos(&self, kind: PopularKind) -> Result<Vec<VideoRow>, sqlx::Error> {
        let sql = match kind {
            PopularKind::MostViewed => format!(
                "SELECT {VIDEO_COLUMNS} FROM video_archive
                 WHERE view_count > 0
                 ORDER BY view_count DESC, id DESC LIMIT ?"
            ),
            PopularKind::HighestRated => format!(
                "SELECT {VIDEO_COLUMNS} FROM video_archive
                 JOIN (SELECT video_id, AVG(rating) AS average, COUNT(*) AS votes
                       FROM video_ratings GROUP BY video_id) r
                   ON r.video_id = video_archive.id
                 ORDER BY r.average DESC, r.votes DESC, id DESC LIMIT ?"
            ),
        };
        sqlx::query_as(&sql)
            .bind(POPULAR_LIMIT)
            .fetch_all(&self.pool)
            .await
    }
}
