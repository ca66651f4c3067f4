use teloxide::prelude::*;
use teloxide::types::{InlineQueryResult, InlineQueryResultCachedVideo};

use crate::db::{Database, VideoRow};
use crate::error::HandlerResult;

/// Telegram accepts at most 50 results per answer.
const PAGE_SIZE: i64 = 50;
const CACHE_TIME_SECS: u32 = 10;

fn to_result(video: &VideoRow) -> InlineQueryResult {
    let description = video
        .metadata()
        .map(|metadata| metadata.summary())
        .unwrap_or_default();
    let mut result =
        InlineQueryResultCachedVideo::new(video.id.to_string(), video.file_id.clone(), video.title())
            .description(description);
    if let Some(caption) = &video.caption {
        result = result.caption(caption.clone());
    }
    InlineQueryResult::CachedVideo(result)
}

/// Offset of the next page, or empty when this was the last one.
fn next_offset(offset: i64, returned: usize) -> String {
    if returned as i64 == PAGE_SIZE {
        (offset + PAGE_SIZE).to_string()
    } else {
        String::new()
    }
}

/// Searches the archive from any chat. An empty query lists the newest
/// videos.
pub async fn handle_inline_query(bot: Bot, q: InlineQuery, db: Database) -> HandlerResult {
    let offset = q.offset.parse::<i64>().unwrap_or(0).max(0);
    log::debug!("Inline query {:?} at offset {offset}", q.query);

    let videos = db.search_inline(&q.query, offset, PAGE_SIZE).await?;
    let next = next_offset(offset, videos.len());
    let results: Vec<InlineQueryResult> = videos.iter().map(to_result).collect();

    if let Err(e) = bot
        .answer_inline_query(q.id, results)
        .cache_time(CACHE_TIME_SECS)
        .is_personal(true)
        .next_offset(next)
        .await
    {
        log::error!("Error answering inline query: {e:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_page_points_at_the_next_one() {
        assert_eq!(next_offset(0, 50), "50");
        assert_eq!(next_offset(100, 50), "150");
        assert_eq!(next_offset(50, 12), "");
    }

    #[test]
    fn result_carries_file_and_caption() {
        let video = VideoRow {
            id: 3,
            message_id: 30,
            caption: Some("Dark S01E02 720p".into()),
            chat_id: -100,
            file_name: None,
            file_id: "file-3".into(),
            category_id: None,
            metadata: r#"{"season_number":1,"episode_number":2}"#.into(),
            view_count: 0,
            grouping_key: None,
            upload_date: String::new(),
        };
        let InlineQueryResult::CachedVideo(result) = to_result(&video) else {
            panic!("expected a cached video");
        };
        assert_eq!(result.id, "3");
        assert_eq!(result.video_file_id, "file-3");
        assert_eq!(result.title, "Dark S01E02 720p");
        assert_eq!(result.description.as_deref(), Some("S01 | E02"));
        assert_eq!(result.caption.as_deref(), Some("Dark S01E02 720p"));
    }
}
