use std::sync::Arc;

use teloxide::prelude::*;

use crate::config::Config;
use crate::db::{Database, NewVideo};
use crate::error::HandlerResult;
use crate::metadata::{build_grouping_key, extract_video_metadata, VideoMetadata};

/// Parsed metadata enriched with what Telegram reports about the file itself.
fn upload_metadata(
    caption: Option<&str>,
    file_name: Option<&str>,
    duration_secs: u32,
    height: u32,
) -> VideoMetadata {
    let mut metadata = extract_video_metadata(caption, file_name);
    metadata.duration = Some(duration_secs);
    if metadata.quality_resolution.is_none() && height > 0 {
        metadata.quality_resolution = Some(format!("{height}p"));
    }
    metadata
}

/// Archives videos posted (or edited) in the archive channel under the
/// active category.
pub async fn handle_channel_post(msg: Message, db: Database, config: Arc<Config>) -> HandlerResult {
    if msg.chat.id != config.channel_id {
        return Ok(());
    }
    let Some(video) = msg.video() else {
        return Ok(());
    };
    let Some(category_id) = db.active_category_id().await? else {
        log::warn!(
            "No active category set; video in message {} was not archived",
            msg.id
        );
        return Ok(());
    };

    let caption = msg.caption();
    let file_name = video.file_name.as_deref();
    let metadata = upload_metadata(caption, file_name, video.duration.seconds(), video.height);
    let grouping_key = build_grouping_key(&metadata, caption, file_name);

    let id = db
        .add_video(&NewVideo {
            message_id: msg.id.0,
            chat_id: msg.chat.id.0,
            caption,
            file_name,
            file_id: &video.file.id,
            metadata: &metadata,
            grouping_key: grouping_key.as_deref(),
            category_id: Some(category_id),
        })
        .await?;

    log::info!(
        "Archived message {} as video {id} in category {category_id} (key: {})",
        msg.id,
        grouping_key.as_deref().unwrap_or("-")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_fills_missing_quality() {
        let metadata = upload_metadata(Some("فيلم الرحلة"), None, 5400, 720);
        assert_eq!(metadata.quality_resolution.as_deref(), Some("720p"));
        assert_eq!(metadata.duration, Some(5400));
    }

    #[test]
    fn caption_quality_wins_over_height() {
        let metadata = upload_metadata(Some("Dark S01E01 1080p"), Some("dark.mkv"), 60, 720);
        assert_eq!(metadata.quality_resolution.as_deref(), Some("1080p"));
    }

    #[test]
    fn unknown_height_leaves_quality_empty() {
        let metadata = upload_metadata(Some("clip"), None, 10, 0);
        assert_eq!(metadata.quality_resolution, None);
    }
}
