//! Admin commands, the admin panel and the flows it starts.

use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId};
use teloxide::{ApiError, RequestError};
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::views::{self, Screen};
use super::AdminCommand;
use crate::config::Config;
use crate::db::Database;
use crate::error::HandlerResult;
use crate::keyboards::{self, AdminAction, CallbackAction};
use crate::rebuild::{rebuild_all, RebuildProgress};
use crate::session::{PendingInput, SessionStore};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(1500);
/// Keeps broadcasts under Telegram's global rate limit.
const BROADCAST_DELAY: Duration = Duration::from_millis(50);

const PANEL_TEXT: &str = "🛠 لوحة تحكم المشرف";

pub async fn handle_admin_command(
    bot: Bot,
    msg: Message,
    cmd: AdminCommand,
    db: Database,
    config: Arc<Config>,
) -> HandlerResult {
    let chat_id = msg.chat.id;
    match cmd {
        AdminCommand::Admin => {
            let active = match db.active_category_id().await? {
                Some(id) => db.category(id).await?.map(|c| c.full_path),
                None => None,
            };
            let text = format!(
                "{PANEL_TEXT}\nقناة الأرشيف: {}\nالتصنيف النشط: {}",
                config.channel_id,
                active.as_deref().unwrap_or("غير محدد")
            );
            bot.send_message(chat_id, text)
                .reply_markup(keyboards::admin_panel())
                .await?;
        }
        AdminCommand::AddChannel {
            channel_id,
            channel_name,
        } => {
            db.add_required_channel(channel_id, &channel_name).await?;
            log::info!("Required channel {channel_id} ({channel_name}) added");
            bot.send_message(chat_id, format!("✅ تمت إضافة القناة {channel_name} ({channel_id})."))
                .await?;
        }
        AdminCommand::RemoveChannel(channel_id) => {
            let text = if db.remove_required_channel(channel_id).await? {
                log::info!("Required channel {channel_id} removed");
                format!("✅ تمت إزالة القناة {channel_id}.")
            } else {
                format!("القناة {channel_id} غير موجودة في القائمة.")
            };
            bot.send_message(chat_id, text).await?;
        }
        AdminCommand::Stats => {
            let stats = db.stats().await?;
            bot.send_message(chat_id, views::stats_text(&stats)).await?;
        }
    }
    Ok(())
}

/// Button presses on the admin panel and its pickers. The caller has already
/// checked that the user is an admin.
pub async fn handle_admin_action(
    bot: &Bot,
    db: &Database,
    sessions: &SessionStore,
    screen: Screen,
    user: UserId,
    action: AdminAction,
) -> HandlerResult {
    let back = || {
        InlineKeyboardMarkup::new(vec![vec![
            CallbackAction::from(AdminAction::Panel).button("🔙 لوحة التحكم")
        ]])
    };

    match action {
        AdminAction::Panel => views::show(bot, screen, PANEL_TEXT, keyboards::admin_panel()).await,
        AdminAction::PickParent => {
            let categories = db.all_categories().await?;
            views::show(
                bot,
                screen,
                "اختر التصنيف الأب للتصنيف الجديد:",
                keyboards::parent_picker(&categories),
            )
            .await
        }
        AdminAction::AddCategory { parent_id } => {
            sessions
                .set_pending(user, PendingInput::CategoryName { parent_id })
                .await;
            views::show(bot, screen, "أرسل اسم التصنيف الجديد:", back()).await
        }
        AdminAction::PickActiveCategory => {
            let categories = db.all_categories().await?;
            if categories.is_empty() {
                return views::show(bot, screen, "لا توجد تصنيفات بعد.", back()).await;
            }
            let picker = keyboards::category_picker(&categories, |c| {
                AdminAction::SetActiveCategory(c.id).into()
            });
            views::show(bot, screen, "اختر التصنيف الذي ستُحفظ فيه الفيديوهات الجديدة:", picker)
                .await
        }
        AdminAction::SetActiveCategory(id) => {
            let text = match db.category(id).await? {
                Some(category) => {
                    db.set_active_category_id(id).await?;
                    log::info!("Active category set to {} ({id})", category.full_path);
                    format!("✅ التصنيف النشط الآن: {}", category.full_path)
                }
                None => "هذا التصنيف لم يعد موجوداً.".to_string(),
            };
            views::show(bot, screen, text, back()).await
        }
        AdminAction::MoveVideo => {
            sessions.set_pending(user, PendingInput::MoveVideoId).await;
            views::show(bot, screen, "أرسل رقم الفيديو (🆔) المراد نقله:", back()).await
        }
        AdminAction::MoveVideoTo {
            video_id,
            category_id,
        } => {
            let text = match db.category(category_id).await? {
                Some(category) => {
                    if db.move_video(video_id, category_id).await? {
                        log::info!("Moved video {video_id} to {}", category.full_path);
                        format!("✅ تم نقل الفيديو {video_id} إلى {}", category.full_path)
                    } else {
                        format!("الفيديو {video_id} غير موجود.")
                    }
                }
                None => "هذا التصنيف لم يعد موجوداً.".to_string(),
            };
            views::show(bot, screen, text, back()).await
        }
        AdminAction::DeleteVideos => {
            sessions.set_pending(user, PendingInput::DeleteVideoIds).await;
            views::show(
                bot,
                screen,
                "أرسل أرقام الفيديوهات المراد حذفها، مفصولة بمسافات أو فواصل:",
                back(),
            )
            .await
        }
        AdminAction::PickCategoryToDelete => {
            let categories = db.all_categories().await?;
            if categories.is_empty() {
                return views::show(bot, screen, "لا توجد تصنيفات بعد.", back()).await;
            }
            let picker = keyboards::category_picker(&categories, |c| {
                AdminAction::DeleteCategory(c.id).into()
            });
            views::show(
                bot,
                screen,
                "⚠️ اختر التصنيف المراد حذفه (سيتم حذف فيديوهاته وتصنيفاته الفرعية):",
                picker,
            )
            .await
        }
        AdminAction::DeleteCategory(id) => {
            let text = match db.category(id).await? {
                Some(category) => {
                    let videos = db.delete_category(id).await?;
                    log::info!("Deleted category {} with {videos} videos", category.full_path);
                    format!("🗑 تم حذف التصنيف {} و{videos} فيديو.", category.full_path)
                }
                None => "هذا التصنيف لم يعد موجوداً.".to_string(),
            };
            views::show(bot, screen, text, back()).await
        }
        AdminAction::Rebuild => start_rebuild(bot.clone(), db.clone(), screen.chat_id()).await,
        AdminAction::Broadcast => {
            sessions.set_pending(user, PendingInput::BroadcastMessage).await;
            views::show(
                bot,
                screen,
                "أرسل الرسالة المراد إرسالها لجميع المستخدمين:",
                back(),
            )
            .await
        }
        AdminAction::Stats => {
            let stats = db.stats().await?;
            views::show(bot, screen, views::stats_text(&stats), back()).await
        }
    }
}

pub async fn create_category(
    bot: &Bot,
    db: &Database,
    chat_id: ChatId,
    name: &str,
    parent_id: Option<i64>,
) -> HandlerResult {
    let name = name.trim();
    if name.is_empty() || name.contains('/') {
        bot.send_message(chat_id, "اسم التصنيف غير صالح.").await?;
        return Ok(());
    }
    let text = match db.add_category(name, parent_id).await {
        Ok(category) => {
            log::info!("Category {} created", category.full_path);
            format!("✅ تم إنشاء التصنيف {}", category.full_path)
        }
        Err(sqlx::Error::RowNotFound) => "التصنيف الأب لم يعد موجوداً.".to_string(),
        Err(e) => return Err(e.into()),
    };
    bot.send_message(chat_id, text)
        .reply_markup(keyboards::admin_panel())
        .await?;
    Ok(())
}

/// Extracts video ids from free text such as `12, 15 18`. Anything that isn't
/// a number is ignored.
pub fn parse_video_ids(text: &str) -> Vec<i64> {
    let mut ids: Vec<i64> = text
        .split(|c: char| c == ',' || c == '،' || c.is_whitespace())
        .filter_map(|part| part.trim().parse().ok())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

pub async fn delete_videos(bot: &Bot, db: &Database, chat_id: ChatId, text: &str) -> HandlerResult {
    let ids = parse_video_ids(text);
    let reply = if ids.is_empty() {
        "لم أجد أي رقم فيديو صالح.".to_string()
    } else {
        let deleted = db.delete_videos(&ids).await?;
        log::info!("Deleted {deleted} of {} requested videos", ids.len());
        format!("🗑 تم حذف {deleted} من أصل {} فيديو.", ids.len())
    };
    bot.send_message(chat_id, reply).await?;
    Ok(())
}

pub async fn pick_move_target(
    bot: &Bot,
    db: &Database,
    chat_id: ChatId,
    text: &str,
) -> HandlerResult {
    let video = match text.trim().parse::<i64>() {
        Ok(id) => db.video(id).await?,
        Err(_) => None,
    };
    let Some(video) = video else {
        bot.send_message(chat_id, "لم أجد فيديو بهذا الرقم.").await?;
        return Ok(());
    };
    let categories = db.all_categories().await?;
    let picker = keyboards::category_picker(&categories, |c| {
        AdminAction::MoveVideoTo {
            video_id: video.id,
            category_id: c.id,
        }
        .into()
    });
    bot.send_message(chat_id, format!("اختر التصنيف الجديد لـ: {}", video.title()))
        .reply_markup(picker)
        .await?;
    Ok(())
}

/// Copies the admin's message to every registered user. Users who blocked
/// the bot or deleted their account are forgotten.
pub async fn broadcast(bot: &Bot, db: &Database, msg: &Message) -> HandlerResult {
    let users = db.all_user_ids().await?;
    let status = bot
        .send_message(msg.chat.id, format!("📣 جارِ الإرسال إلى {} مستخدم...", users.len()))
        .await?;

    let (mut sent, mut failed, mut removed) = (0usize, 0usize, 0usize);
    for user_id in users {
        match bot.copy_message(ChatId(user_id), msg.chat.id, msg.id).await {
            Ok(_) => sent += 1,
            Err(RequestError::Api(ApiError::BotBlocked | ApiError::UserDeactivated)) => {
                db.remove_bot_user(user_id).await?;
                removed += 1;
            }
            Err(e) => {
                log::warn!("Broadcast to {user_id} failed: {e}");
                failed += 1;
            }
        }
        tokio::time::sleep(BROADCAST_DELAY).await;
    }

    log::info!("Broadcast done: {sent} sent, {failed} failed, {removed} removed");
    edit_status(
        bot,
        msg.chat.id,
        status.id,
        format!("✅ انتهى الإرسال.\nتم: {sent}\nفشل: {failed}\nمستخدمون حظروا البوت: {removed}"),
    )
    .await;
    Ok(())
}

/// Edits a status message, ignoring "not modified" and logging anything else.
async fn edit_status(bot: &Bot, chat_id: ChatId, message_id: MessageId, text: String) {
    match bot.edit_message_text(chat_id, message_id, text).await {
        Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => {}
        Err(e) => log::error!("Could not edit status message: {e}"),
    }
}

fn progress_text(step: RebuildProgress) -> String {
    format!(
        "⏳ جارِ إعادة بناء البيانات... ({}/{}) - {}%",
        step.done,
        step.total,
        step.percent()
    )
}

/// Runs the rebuild in the background, editing one status message as it
/// goes.
async fn start_rebuild(bot: Bot, db: Database, chat_id: ChatId) -> HandlerResult {
    let status_id = bot
        .send_message(chat_id, "⏳ جارِ إعادة بناء البيانات...")
        .await?
        .id;
    log::info!("Metadata rebuild requested from chat {chat_id}");

    tokio::spawn(async move {
        let (tx, mut rx) = mpsc::unbounded_channel::<RebuildProgress>();

        let reporter = {
            let bot = bot.clone();
            tokio::spawn(async move {
                let mut last_edit: Option<Instant> = None;
                while let Some(step) = rx.recv().await {
                    let due = last_edit.map_or(true, |at| at.elapsed() >= PROGRESS_INTERVAL);
                    if due || step.done == step.total {
                        edit_status(&bot, chat_id, status_id, progress_text(step)).await;
                        last_edit = Some(Instant::now());
                    }
                }
            })
        };

        let result = rebuild_all(&db, Some(&tx)).await;
        drop(tx);
        if let Err(e) = reporter.await {
            log::error!("Rebuild progress reporter crashed: {e}");
        }

        let text = match result {
            Ok(report) if report.total == 0 => "✅ لا توجد فيديوهات لتحديثها.".to_string(),
            Ok(report) => format!(
                "✅ اكتملت إعادة بناء البيانات!\n\n- تم التحديث: {}\n- فشل: {}",
                report.updated, report.failed
            ),
            Err(e) => {
                log::error!("Metadata rebuild failed: {e}");
                format!("❌ حدث خطأ أثناء التحديث، لم يتم حفظ أي تغيير: {e}")
            }
        };
        edit_status(&bot, chat_id, status_id, text).await;
    });
    Ok(())
}
