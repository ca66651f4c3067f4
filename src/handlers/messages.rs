use std::sync::Arc;

use teloxide::prelude::*;

use super::views::{self, Screen};
use super::{admin, subscription};
use crate::config::Config;
use crate::db::Database;
use crate::error::HandlerResult;
use crate::keyboards::{
    self, MENU_CATEGORIES, MENU_FAVORITES, MENU_HISTORY, MENU_POPULAR, MENU_RANDOM, MENU_SEARCH,
};
use crate::session::{PendingInput, SessionStore};

/// Private messages that aren't commands: answers to a pending prompt, main
/// menu buttons, or otherwise a free text search.
pub async fn handle_private_message(
    bot: Bot,
    msg: Message,
    db: Database,
    sessions: SessionStore,
    config: Arc<Config>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref().map(|user| user.id) else {
        return Ok(());
    };
    let chat_id = msg.chat.id;

    // Unknown commands leave an open prompt waiting for its real answer.
    if msg.text().is_some_and(|text| text.trim_start().starts_with('/')) {
        return Ok(());
    }
    if let Some(pending) = sessions.take_pending(user).await {
        return answer_pending(&bot, &msg, &db, &sessions, &config, pending).await;
    }

    let Some(text) = msg.text().map(str::trim) else {
        return Ok(());
    };
    if text.is_empty() {
        return Ok(());
    }
    if !subscription::ensure_subscribed(&bot, &db, &config, chat_id, user).await? {
        return Ok(());
    }

    match text {
        MENU_SEARCH => {
            sessions.set_pending(user, PendingInput::SearchQuery).await;
            bot.send_message(chat_id, "أرسل الكلمة المفتاحية للبحث:")
                .await?;
        }
        MENU_CATEGORIES => views::show_category(&bot, &db, Screen::New(chat_id), None, 0).await?,
        MENU_RANDOM => views::send_random(&bot, &db, chat_id, user).await?,
        MENU_FAVORITES => views::show_favorites(&bot, &db, Screen::New(chat_id), user, 0).await?,
        MENU_HISTORY => views::show_history(&bot, &db, Screen::New(chat_id), user, 0).await?,
        MENU_POPULAR => {
            bot.send_message(chat_id, "اختر نوع الفيديوهات الشائعة:")
                .reply_markup(keyboards::popular_menu())
                .await?;
        }
        query => {
            views::start_search(&bot, &db, &sessions, Screen::New(chat_id), user, query).await?
        }
    }
    Ok(())
}

async fn answer_pending(
    bot: &Bot,
    msg: &Message,
    db: &Database,
    sessions: &SessionStore,
    config: &Config,
    pending: PendingInput,
) -> HandlerResult {
    let chat_id = msg.chat.id;
    let Some(user) = msg.from.as_ref().map(|user| user.id) else {
        return Ok(());
    };

    if pending == PendingInput::SearchQuery {
        return match msg.text() {
            Some(query) => {
                views::start_search(bot, db, sessions, Screen::New(chat_id), user, query).await
            }
            None => {
                bot.send_message(chat_id, "يرجى إرسال نص للبحث.").await?;
                Ok(())
            }
        };
    }

    if !config.is_admin(user) {
        log::warn!("Ignoring admin input {pending:?} from non-admin {user}");
        return Ok(());
    }
    match pending {
        PendingInput::SearchQuery => Ok(()),
        PendingInput::BroadcastMessage => admin::broadcast(bot, db, msg).await,
        PendingInput::CategoryName { parent_id } => match msg.text() {
            Some(name) => admin::create_category(bot, db, chat_id, name, parent_id).await,
            None => {
                bot.send_message(chat_id, "يرجى إرسال اسم التصنيف نصاً.")
                    .await?;
                Ok(())
            }
        },
        PendingInput::DeleteVideoIds => {
            admin::delete_videos(bot, db, chat_id, msg.text().unwrap_or_default()).await
        }
        PendingInput::MoveVideoId => {
            admin::pick_move_target(bot, db, chat_id, msg.text().unwrap_or_default()).await
        }
    }
}
