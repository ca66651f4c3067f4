use sqlx::{QueryBuilder, Sqlite};

use super::{page_offset, Database, Page, VIDEOS_PER_PAGE};
use crate::error::BotError;
use crate::metadata::{Status, VideoMetadata};

pub(super) const VIDEO_COLUMNS: &str = "id, message_id, caption, chat_id, file_name, file_id, category_id, \
     metadata, view_count, grouping_key, upload_date";

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct VideoRow {
    pub id: i64,
    /// Message id of the post inside the archive channel.
    pub message_id: i32,
    pub caption: Option<String>,
    pub chat_id: i64,
    pub file_name: Option<String>,
    pub file_id: String,
    pub category_id: Option<i64>,
    /// Serialized [`VideoMetadata`].
    pub metadata: String,
    pub view_count: i64,
    pub grouping_key: Option<String>,
    pub upload_date: String,
}

impl VideoRow {
    pub fn metadata(&self) -> Result<VideoMetadata, serde_json::Error> {
        serde_json::from_str(&self.metadata)
    }

    /// First caption line, falling back to the file name and then the id.
    pub fn title(&self) -> String {
        let first_line = self
            .caption
            .as_deref()
            .and_then(|caption| caption.lines().map(str::trim).find(|line| !line.is_empty()));
        match (first_line, self.file_name.as_deref()) {
            (Some(line), _) => line.to_string(),
            (None, Some(file_name)) if !file_name.is_empty() => file_name.to_string(),
            _ => format!("فيديو {}", self.id),
        }
    }
}

/// Everything needed to archive one channel post.
#[derive(Debug, Clone)]
pub struct NewVideo<'a> {
    pub message_id: i32,
    pub chat_id: i64,
    pub caption: Option<&'a str>,
    pub file_name: Option<&'a str>,
    pub file_id: &'a str,
    pub metadata: &'a VideoMetadata,
    pub grouping_key: Option<&'a str>,
    pub category_id: Option<i64>,
}

/// Text search plus optional narrowing by category or parsed metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub query: String,
    pub category_id: Option<i64>,
    pub quality: Option<String>,
    pub status: Option<Status>,
}

impl SearchFilter {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        let pattern = like_pattern(&self.query);
        builder
            .push(" WHERE (caption LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR file_name LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
        if let Some(category_id) = self.category_id {
            builder.push(" AND category_id = ").push_bind(category_id);
        }
        if let Some(quality) = &self.quality {
            builder
                .push(" AND json_extract(metadata, '$.quality_resolution') = ")
                .push_bind(quality.clone());
        }
        if let Some(status) = self.status {
            builder
                .push(" AND json_extract(metadata, '$.status') = ")
                .push_bind(status.label());
        }
    }
}

fn like_pattern(query: &str) -> String {
    let escaped = query
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

impl Database {
    /// Inserts the video, or refreshes it when the same channel message is
    /// seen again (edited posts). Returns the row id.
    pub async fn add_video(&self, video: &NewVideo<'_>) -> Result<i64, BotError> {
        let metadata = serde_json::to_string(video.metadata)?;
        let id = sqlx::query_scalar(
            "INSERT INTO video_archive
                 (message_id, caption, chat_id, file_name, file_id, metadata, grouping_key, category_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (message_id) DO UPDATE SET
                 caption = excluded.caption,
                 file_name = excluded.file_name,
                 file_id = excluded.file_id,
                 metadata = excluded.metadata,
                 grouping_key = excluded.grouping_key,
                 category_id = excluded.category_id
             RETURNING id",
        )
        .bind(video.message_id)
        .bind(video.caption)
        .bind(video.chat_id)
        .bind(video.file_name)
        .bind(video.file_id)
        .bind(metadata)
        .bind(video.grouping_key)
        .bind(video.category_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn video(&self, id: i64) -> Result<Option<VideoRow>, sqlx::Error> {
        sqlx::query_as(&format!("SELECT {VIDEO_COLUMNS} FROM video_archive WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn videos_in_category(
        &self,
        category_id: i64,
        page: u32,
    ) -> Result<Page<VideoRow>, sqlx::Error> {
        let items = sqlx::query_as(&format!(
            "SELECT {VIDEO_COLUMNS} FROM video_archive WHERE category_id = ?
             ORDER BY id DESC LIMIT ? OFFSET ?"
        ))
        .bind(category_id)
        .bind(i64::from(VIDEOS_PER_PAGE))
        .bind(page_offset(page))
        .fetch_all(&self.pool)
        .await?;
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM video_archive WHERE category_id = ?")
            .bind(category_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(Page { items, total, page })
    }

    pub async fn search_videos(
        &self,
        filter: &SearchFilter,
        page: u32,
    ) -> Result<Page<VideoRow>, sqlx::Error> {
        let mut query = QueryBuilder::new(format!("SELECT {VIDEO_COLUMNS} FROM video_archive"));
        filter.push_where(&mut query);
        query
            .push(" ORDER BY id DESC LIMIT ")
            .push_bind(i64::from(VIDEOS_PER_PAGE))
            .push(" OFFSET ")
            .push_bind(page_offset(page));
        let items = query
            .build_query_as::<VideoRow>()
            .fetch_all(&self.pool)
            .await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM video_archive");
        filter.push_where(&mut count);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(Page { items, total, page })
    }

    /// Search for inline mode. An empty query lists the newest videos.
    pub async fn search_inline(
        &self,
        query: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<VideoRow>, sqlx::Error> {
        let pattern = like_pattern(query);
        sqlx::query_as(&format!(
            "SELECT {VIDEO_COLUMNS} FROM video_archive
             WHERE caption LIKE ?1 ESCAPE '\\' OR file_name LIKE ?1 ESCAPE '\\'
             ORDER BY id DESC LIMIT ?2 OFFSET ?3"
        ))
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn random_video(&self) -> Result<Option<VideoRow>, sqlx::Error> {
        sqlx::query_as(&format!(
            "SELECT {VIDEO_COLUMNS} FROM video_archive ORDER BY RANDOM() LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn increment_view_count(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE video_archive SET view_count = view_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Deletes the given videos and returns how many existed.
    pub async fn delete_videos(&self, ids: &[i64]) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM video_archive WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Returns `false` when no such video exists.
    pub async fn move_video(&self, id: i64, category_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE video_archive SET category_id = ? WHERE id = ?")
            .bind(category_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{database, insert_video};
    use super::*;

    #[tokio::test]
    async fn stores_parsed_metadata_and_grouping_key() {
        let db = database().await;
        let id = insert_video(&db, 10, "Breaking Bad S01E05 720p مترجم", None).await;

        let video = db.video(id).await.unwrap().unwrap();
        let metadata = video.metadata().unwrap();
        assert_eq!(metadata.season_number, Some(1));
        assert_eq!(metadata.episode_number, Some(5));
        assert_eq!(metadata.status, Some(Status::Subtitled));
        assert_eq!(video.grouping_key.as_deref(), Some("series-breaking-bad-s01-e05"));
        assert_eq!(video.title(), "Breaking Bad S01E05 720p مترجم");
    }

    #[tokio::test]
    async fn same_message_is_upserted() {
        let db = database().await;
        let first = insert_video(&db, 7, "old caption", None).await;
        let second = insert_video(&db, 7, "new caption", None).await;
        assert_eq!(first, second);

        let video = db.video(first).await.unwrap().unwrap();
        assert_eq!(video.caption.as_deref(), Some("new caption"));
    }

    #[tokio::test]
    async fn search_matches_caption_and_filters_metadata() {
        let db = database().await;
        insert_video(&db, 1, "Dark 720p مترجم", None).await;
        insert_video(&db, 2, "Dark 1080p مدبلج", None).await;
        insert_video(&db, 3, "Something else", None).await;

        let all = db.search_videos(&SearchFilter::new("dark"), 0).await.unwrap();
        assert_eq!(all.total, 2);

        let filter = SearchFilter {
            quality: Some("1080p".into()),
            ..SearchFilter::new("Dark")
        };
        let hd = db.search_videos(&filter, 0).await.unwrap();
        assert_eq!(hd.total, 1);
        assert_eq!(hd.items[0].message_id, 2);

        let filter = SearchFilter {
            status: Some(Status::Subtitled),
            ..SearchFilter::new("Dark")
        };
        let subbed = db.search_videos(&filter, 0).await.unwrap();
        assert_eq!(subbed.items.len(), 1);
        assert_eq!(subbed.items[0].message_id, 1);
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let db = database().await;
        insert_video(&db, 1, "100% action", None).await;
        insert_video(&db, 2, "1000 action", None).await;

        let page = db.search_videos(&SearchFilter::new("100%"), 0).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].message_id, 1);
    }

    #[tokio::test]
    async fn search_paginates_newest_first() {
        let db = database().await;
        for message_id in 1..=12 {
            insert_video(&db, message_id, &format!("Clip {message_id}"), None).await;
        }

        let first = db.search_videos(&SearchFilter::new("clip"), 0).await.unwrap();
        assert_eq!(first.total, 12);
        assert_eq!(first.items.len(), VIDEOS_PER_PAGE as usize);
        assert_eq!(first.items[0].message_id, 12);
        assert!(first.has_next());

        let second = db.search_videos(&SearchFilter::new("clip"), 1).await.unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(!second.has_next());
    }

    #[tokio::test]
    async fn inline_search_with_empty_query_lists_everything() {
        let db = database().await;
        insert_video(&db, 1, "One", None).await;
        insert_video(&db, 2, "Two", None).await;

        let rows = db.search_inline("", 0, 50).await.unwrap();
        assert_eq!(rows.len(), 2);
        let rows = db.search_inline("two", 0, 50).await.unwrap();
        assert_eq!(rows.len(), 1);
        let rows = db.search_inline("", 1, 50).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn delete_and_move() {
        let db = database().await;
        let category = db.add_category("Movies", None).await.unwrap();
        let a = insert_video(&db, 1, "A", None).await;
        let b = insert_video(&db, 2, "B", None).await;

        assert!(db.move_video(a, category.id).await.unwrap());
        assert!(!db.move_video(999, category.id).await.unwrap());
        let page = db.videos_in_category(category.id, 0).await.unwrap();
        assert_eq!(page.total, 1);

        assert_eq!(db.delete_videos(&[a, b, 999]).await.unwrap(), 2);
        assert_eq!(db.delete_videos(&[]).await.unwrap(), 0);
        assert!(db.video(a).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn view_counter_and_random_pick() {
        let db = database().await;
        assert!(db.random_video().await.unwrap().is_none());

        let id = insert_video(&db, 1, "Only one", None).await;
        db.increment_view_count(id).await.unwrap();
        db.increment_view_count(id).await.unwrap();

        let video = db.random_video().await.unwrap().unwrap();
        assert_eq!(video.id, id);
        assert_eq!(video.view_count, 2);
    }

    #[test]
    fn title_falls_back_to_file_name_then_id() {
        let mut row = VideoRow {
            id: 4,
            message_id: 1,
            caption: Some("\n  \nSecond line".into()),
            chat_id: -1,
            file_name: Some("clip.mp4".into()),
            file_id: "f".into(),
            category_id: None,
            metadata: "{}".into(),
            view_count: 0,
            grouping_key: None,
            upload_date: String::new(),
        };
        assert_eq!(row.title(), "Second line");
        row.caption = None;
        assert_eq!(row.title(), "clip.mp4");
        row.file_name = None;
        assert_eq!(row.title(), "فيديو 4");
    }
}
