//! Re-parses every archived caption and rewrites the stored metadata.

use sqlx::{Connection, SqliteConnection};
use tokio::sync::mpsc::UnboundedSender;

use crate::db::Database;
use crate::error::BotError;
use crate::metadata::{build_grouping_key, extract_video_metadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildProgress {
    pub done: usize,
    pub total: usize,
}

impl RebuildProgress {
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            100
        } else {
            self.done * 100 / self.total
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub total: usize,
    pub updated: usize,
    pub failed: usize,
}

#[derive(sqlx::FromRow)]
struct StoredUpload {
    id: i64,
    caption: Option<String>,
    file_name: Option<String>,
}

/// Recomputes metadata and grouping key for every stored video, replacing
/// the previous values. Each row runs under its own savepoint: a row that
/// fails is rolled back, logged and counted. The batch commits once at the
/// end, so any other error leaves the archive untouched.
pub async fn rebuild_all(
    db: &Database,
    progress: Option<&UnboundedSender<RebuildProgress>>,
) -> Result<RebuildReport, BotError> {
    let mut tx = db.pool().begin().await?;
    let uploads: Vec<StoredUpload> =
        sqlx::query_as("SELECT id, caption, file_name FROM video_archive ORDER BY id")
            .fetch_all(&mut *tx)
            .await?;

    let mut report = RebuildReport {
        total: uploads.len(),
        ..RebuildReport::default()
    };
    log::info!("Rebuilding metadata for {} videos", report.total);

    for (i, upload) in uploads.iter().enumerate() {
        let mut row = Connection::begin(&mut *tx).await?;
        match rewrite(&mut row, upload).await {
            Ok(()) => {
                row.commit().await?;
                report.updated += 1;
            }
            Err(e) => {
                // Failing here means the outer transaction is gone too.
                row.rollback().await?;
                report.failed += 1;
                log::warn!("Could not rebuild metadata of video {}: {e}", upload.id);
            }
        }

        if let Some(progress) = progress {
            // The receiver may have gone away; the rebuild carries on regardless.
            let _ = progress.send(RebuildProgress {
                done: i + 1,
                total: report.total,
            });
        }
    }

    tx.commit().await?;
    log::info!(
        "Metadata rebuild finished: {} updated, {} failed",
        report.updated,
        report.failed
    );
    Ok(report)
}

async fn rewrite(conn: &mut SqliteConnection, upload: &StoredUpload) -> Result<(), BotError> {
    let caption = upload.caption.as_deref();
    let file_name = upload.file_name.as_deref();
    let metadata = extract_video_metadata(caption, file_name);
    let grouping_key = build_grouping_key(&metadata, caption, file_name);

    sqlx::query("UPDATE video_archive SET metadata = ?, grouping_key = ? WHERE id = ?")
        .bind(serde_json::to_string(&metadata)?)
        .bind(grouping_key)
        .bind(upload.id)
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{database, insert_video};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn replaces_stale_metadata() {
        let db = database().await;
        let id = insert_video(&db, 1, "مسلسل فلان الموسم الثاني الحلقة 5 مترجم 1080p", None).await;
        sqlx::query("UPDATE video_archive SET metadata = '{\"season_number\":9}', grouping_key = NULL WHERE id = ?")
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap();

        let report = rebuild_all(&db, None).await.unwrap();
        assert_eq!(
            report,
            RebuildReport {
                total: 1,
                updated: 1,
                failed: 0
            }
        );

        let video = db.video(id).await.unwrap().unwrap();
        let metadata = video.metadata().unwrap();
        assert_eq!(metadata.season_number, Some(2));
        assert_eq!(metadata.episode_number, Some(5));
        assert_eq!(metadata.quality_resolution.as_deref(), Some("1080p"));
    }

    #[tokio::test]
    async fn recomputes_grouping_keys() {
        let db = database().await;
        let id = insert_video(&db, 1, "Breaking Bad S01E05 720p", None).await;
        sqlx::query("UPDATE video_archive SET grouping_key = 'stale' WHERE id = ?")
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap();

        rebuild_all(&db, None).await.unwrap();

        let video = db.video(id).await.unwrap().unwrap();
        assert_ne!(video.grouping_key.as_deref(), Some("stale"));
        assert!(video
            .grouping_key
            .as_deref()
            .is_some_and(|key| key.starts_with("series-breaking-bad")));
    }

    #[tokio::test]
    async fn reports_progress_for_every_row() {
        let db = database().await;
        for message_id in 1..=3 {
            insert_video(&db, message_id, "clip", None).await;
        }
        let (tx, mut rx) = mpsc::unbounded_channel();

        let report = rebuild_all(&db, Some(&tx)).await.unwrap();
        drop(tx);

        let mut seen = Vec::new();
        while let Some(step) = rx.recv().await {
            seen.push(step.done);
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(report.updated, 3);
    }

    #[tokio::test]
    async fn empty_archive_is_a_no_op() {
        let db = database().await;
        let report = rebuild_all(&db, None).await.unwrap();
        assert_eq!(report, RebuildReport::default());
    }

    async fn mark_stale(db: &Database) {
        sqlx::query("UPDATE video_archive SET metadata = '{\"season_number\":9}'")
            .execute(db.pool())
            .await
            .unwrap();
    }

    async fn season_of(db: &Database, id: i64) -> Option<u32> {
        let video = db.video(id).await.unwrap().unwrap();
        video.metadata().unwrap().season_number
    }

    #[tokio::test]
    async fn failed_row_is_counted_and_the_rest_are_rewritten() {
        let db = database().await;
        let mut ids = Vec::new();
        for message_id in 1..=3 {
            ids.push(insert_video(&db, message_id, "clip", None).await);
        }
        mark_stale(&db).await;
        sqlx::query(&format!(
            "CREATE TRIGGER reject_row BEFORE UPDATE ON video_archive WHEN NEW.id = {} \
             BEGIN SELECT RAISE(ABORT, 'row is locked'); END",
            ids[1]
        ))
        .execute(db.pool())
        .await
        .unwrap();

        let report = rebuild_all(&db, None).await.unwrap();
        assert_eq!(
            report,
            RebuildReport {
                total: 3,
                updated: 2,
                failed: 1
            }
        );
        assert_eq!(season_of(&db, ids[0]).await, None);
        assert_eq!(season_of(&db, ids[1]).await, Some(9));
        assert_eq!(season_of(&db, ids[2]).await, None);
    }

    #[tokio::test]
    async fn fatal_error_keeps_every_row_unchanged() {
        let db = database().await;
        let mut ids = Vec::new();
        for message_id in 1..=3 {
            ids.push(insert_video(&db, message_id, "clip", None).await);
        }
        mark_stale(&db).await;
        sqlx::query(&format!(
            "CREATE TRIGGER abort_batch BEFORE UPDATE ON video_archive WHEN NEW.id = {} \
             BEGIN SELECT RAISE(ROLLBACK, 'transaction lost'); END",
            ids[1]
        ))
        .execute(db.pool())
        .await
        .unwrap();

        assert!(rebuild_all(&db, None).await.is_err());
        for id in ids {
            assert_eq!(season_of(&db, id).await, Some(9));
        }
    }

    #[test]
    fn percent_handles_empty_batches() {
        assert_eq!(RebuildProgress { done: 0, total: 0 }.percent(), 100);
        assert_eq!(RebuildProgress { done: 1, total: 4 }.percent(), 25);
    }
}
