use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;

use super::views::{self, Screen};
use super::{db_user_id, subscription, AdminCommand, Command};
use crate::config::Config;
use crate::db::Database;
use crate::error::HandlerResult;
use crate::keyboards;
use crate::session::{PendingInput, SessionStore};

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    db: Database,
    sessions: SessionStore,
    config: Arc<Config>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;

    if cmd == Command::Start {
        db.add_bot_user(db_user_id(user.id), user.username.as_deref(), &user.first_name)
            .await?;
    }
    if msg.chat.is_private()
        && cmd != Command::MyId
        && !subscription::ensure_subscribed(&bot, &db, &config, chat_id, user.id).await?
    {
        return Ok(());
    }

    match cmd {
        Command::Start => {
            bot.send_message(chat_id, "أهلاً بك في أرشيف الفيديوهات! استخدم القائمة بالأسفل.")
                .reply_markup(keyboards::main_menu())
                .await?;
        }
        Command::Help => {
            let mut text = Command::descriptions().to_string();
            if config.is_admin(user.id) {
                text.push_str("\n\n");
                text.push_str(&AdminCommand::descriptions().to_string());
            }
            bot.send_message(chat_id, text).await?;
        }
        Command::Search(query) if query.trim().is_empty() => {
            sessions.set_pending(user.id, PendingInput::SearchQuery).await;
            bot.send_message(chat_id, "أرسل الكلمة المفتاحية للبحث:")
                .await?;
        }
        Command::Search(query) => {
            views::start_search(&bot, &db, &sessions, Screen::New(chat_id), user.id, &query)
                .await?;
        }
        Command::Categories => {
            views::show_category(&bot, &db, Screen::New(chat_id), None, 0).await?;
        }
        Command::Random => views::send_random(&bot, &db, chat_id, user.id).await?,
        Command::Favorites => {
            views::show_favorites(&bot, &db, Screen::New(chat_id), user.id, 0).await?;
        }
        Command::History => {
            views::show_history(&bot, &db, Screen::New(chat_id), user.id, 0).await?;
        }
        Command::Popular => {
            bot.send_message(chat_id, "اختر نوع الفيديوهات الشائعة:")
                .reply_markup(keyboards::popular_menu())
                .await?;
        }
        Command::MyId => {
            bot.send_message(chat_id, format!("معرف حسابك هو: `{}`", user.id))
                .parse_mode(ParseMode::MarkdownV2)
                .await?;
        }
        Command::Cancel => {
            sessions.clear(user.id).await;
            bot.send_message(chat_id, "تم إلغاء العملية الحالية.")
                .reply_markup(keyboards::main_menu())
                .await?;
        }
    }
    Ok(())
}
