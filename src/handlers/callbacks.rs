use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::MessageId;
use teloxide::{ApiError, RequestError};

use super::views::{self, Screen};
use super::{admin, db_user_id, subscription};
use crate::config::Config;
use crate::db::Database;
use crate::error::HandlerResult;
use crate::keyboards::{self, CallbackAction};
use crate::session::{LastSearch, SessionStore};

const EXPIRED_SEARCH: &str = "انتهت صلاحية البحث، أرسل كلمة البحث من جديد.";

pub async fn handle_callback_query(
    bot: Bot,
    q: CallbackQuery,
    db: Database,
    sessions: SessionStore,
    config: Arc<Config>,
) -> HandlerResult {
    let user = q.from.id;
    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        log::warn!("Unknown callback data {:?} from {user}", q.data);
        bot.answer_callback_query(q.id)
            .text("هذا الزر لم يعد مدعوماً.")
            .await?;
        return Ok(());
    };
    let Some(message) = q.message.as_ref() else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    let chat_id = message.chat().id;
    let screen = Screen::Edit(chat_id, message.id());

    match &action {
        CallbackAction::Noop => {
            bot.answer_callback_query(q.id).await?;
            return Ok(());
        }
        CallbackAction::CheckSubscription => {
            return recheck_subscription(&bot, &db, &q, screen).await;
        }
        CallbackAction::Admin(_) if !config.is_admin(user) => {
            log::warn!("Non-admin {user} pressed an admin button");
            bot.answer_callback_query(q.id)
                .text("هذا الخيار للمشرفين فقط.")
                .show_alert(true)
                .await?;
            return Ok(());
        }
        _ => {}
    }

    if !subscription::ensure_subscribed(&bot, &db, &config, chat_id, user).await? {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    }

    let notice = match action {
        CallbackAction::Noop | CallbackAction::CheckSubscription => None,
        CallbackAction::Browse { category_id, page } => {
            views::show_category(&bot, &db, screen, category_id, page).await?;
            None
        }
        CallbackAction::Video(id) => match db.video(id).await? {
            Some(video) => {
                views::send_video(&bot, &db, chat_id, user, &video).await?;
                None
            }
            None => Some("هذا الفيديو لم يعد موجوداً.".to_string()),
        },
        CallbackAction::Rate { video_id, rating } => {
            if db.video(video_id).await?.is_none() {
                Some("هذا الفيديو لم يعد موجوداً.".to_string())
            } else {
                db.rate_video(video_id, db_user_id(user), rating).await?;
                refresh_actions(&bot, &db, screen, video_id, user).await?;
                Some(format!("شكراً! تقييمك: {rating} ⭐"))
            }
        }
        CallbackAction::ToggleFavorite(video_id) => {
            let user_id = db_user_id(user);
            let text = if db.is_favorite(user_id, video_id).await? {
                db.remove_favorite(user_id, video_id).await?;
                "تمت الإزالة من المفضلة."
            } else if db.video(video_id).await?.is_some() {
                db.add_favorite(user_id, video_id).await?;
                "تمت الإضافة إلى المفضلة."
            } else {
                "هذا الفيديو لم يعد موجوداً."
            };
            refresh_actions(&bot, &db, screen, video_id, user).await?;
            Some(text.to_string())
        }
        CallbackAction::Favorites(page) => {
            views::show_favorites(&bot, &db, screen, user, page).await?;
            None
        }
        CallbackAction::History(page) => {
            views::show_history(&bot, &db, screen, user, page).await?;
            None
        }
        CallbackAction::SearchPage(page) => {
            views::show_search_results(&bot, &db, &sessions, screen, user, page).await?;
            None
        }
        CallbackAction::FilterMenu => {
            show_filters(&bot, &sessions, screen, user, |_| {}).await?
        }
        CallbackAction::FilterQuality(quality) => {
            show_filters(&bot, &sessions, screen, user, |search| search.quality = quality).await?
        }
        CallbackAction::FilterStatus(status) => {
            show_filters(&bot, &sessions, screen, user, |search| search.status = status).await?
        }
        CallbackAction::PopularMenu => {
            views::show(
                &bot,
                screen,
                "اختر نوع الفيديوهات الشائعة:",
                keyboards::popular_menu(),
            )
            .await?;
            None
        }
        CallbackAction::Popular(kind) => {
            views::show_popular(&bot, &db, screen, kind).await?;
            None
        }
        CallbackAction::Random => {
            views::send_random(&bot, &db, chat_id, user).await?;
            None
        }
        CallbackAction::Admin(action) => {
            admin::handle_admin_action(&bot, &db, &sessions, screen, user, action).await?;
            None
        }
    };

    let answer = bot.answer_callback_query(q.id);
    match notice {
        Some(text) => answer.text(text).await?,
        None => answer.await?,
    };
    Ok(())
}

/// Applies `change` to the user's last search and redraws the filter menu.
/// Returns a notice when there is no search left to refine.
async fn show_filters(
    bot: &Bot,
    sessions: &SessionStore,
    screen: Screen,
    user: UserId,
    change: impl FnOnce(&mut LastSearch),
) -> Result<Option<String>, crate::error::HandlerError> {
    let Some(mut search) = sessions.last_search(user).await else {
        return Ok(Some(EXPIRED_SEARCH.to_string()));
    };
    change(&mut search);
    let markup = keyboards::search_filters(&search);
    let text = format!("⚙️ تصفية نتائج \"{}\":", search.query);
    sessions.set_last_search(user, search).await;
    views::show(bot, screen, text, markup).await?;
    Ok(None)
}

/// Redraws the rating / favorite keyboard under a video after a change.
async fn refresh_actions(
    bot: &Bot,
    db: &Database,
    screen: Screen,
    video_id: i64,
    user: UserId,
) -> HandlerResult {
    let Screen::Edit(chat_id, message_id) = screen else {
        return Ok(());
    };
    let markup = views::video_action_markup(db, video_id, user).await?;
    edit_markup(bot, chat_id, message_id, markup).await
}

async fn edit_markup(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    markup: teloxide::types::InlineKeyboardMarkup,
) -> HandlerResult {
    match bot
        .edit_message_reply_markup(chat_id, message_id)
        .reply_markup(markup)
        .await
    {
        Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn recheck_subscription(
    bot: &Bot,
    db: &Database,
    q: &CallbackQuery,
    screen: Screen,
) -> HandlerResult {
    let missing = subscription::missing_channels(bot, db, q.from.id).await?;
    if !missing.is_empty() {
        bot.answer_callback_query(q.id.clone())
            .text("لم تشترك في جميع القنوات بعد.")
            .show_alert(true)
            .await?;
        return views::show(
            bot,
            screen,
            subscription::PROMPT_TEXT,
            subscription::prompt_markup(&missing),
        )
        .await;
    }

    bot.answer_callback_query(q.id.clone())
        .text("✅ شكراً لاشتراكك!")
        .await?;
    db.add_bot_user(
        db_user_id(q.from.id),
        q.from.username.as_deref(),
        &q.from.first_name,
    )
    .await?;
    bot.send_message(screen.chat_id(), "أهلاً بك في أرشيف الفيديوهات! استخدم القائمة بالأسفل.")
        .reply_markup(keyboards::main_menu())
        .await?;
    Ok(())
}
