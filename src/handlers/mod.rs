//! Update routing. Every endpoint receives its dependencies (`Database`,
//! `SessionStore`, `Arc<Config>`) from the dispatcher.

mod admin;
mod callbacks;
mod channel;
mod commands;
mod inline;
mod messages;
mod subscription;
mod views;

use std::sync::Arc;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::config::Config;
use crate::error::HandlerError;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "الأوامر المتاحة:")]
pub enum Command {
    #[command(description = "بدء استخدام البوت.")]
    Start,
    #[command(description = "عرض هذه الرسالة.")]
    Help,
    #[command(description = "البحث عن فيديو: /search كلمة البحث")]
    Search(String),
    #[command(description = "تصفح التصنيفات.")]
    Categories,
    #[command(description = "اقتراح فيديو عشوائي.")]
    Random,
    #[command(description = "الفيديوهات المفضلة.")]
    Favorites,
    #[command(description = "سجل المشاهدة.")]
    History,
    #[command(description = "الفيديوهات الشائعة.")]
    Popular,
    #[command(description = "عرض معرف حسابك.")]
    MyId,
    #[command(description = "إلغاء العملية الحالية.")]
    Cancel,
}

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "أوامر المشرف:")]
pub enum AdminCommand {
    #[command(description = "لوحة التحكم.")]
    Admin,
    #[command(
        parse_with = "split",
        description = "إضافة قناة اشتراك إجباري: /addchannel المعرف الاسم"
    )]
    AddChannel { channel_id: i64, channel_name: String },
    #[command(description = "إزالة قناة اشتراك إجباري: /removechannel المعرف")]
    RemoveChannel(i64),
    #[command(description = "إحصائيات البوت.")]
    Stats,
}

pub fn schema() -> UpdateHandler<HandlerError> {
    let admin_commands = dptree::filter(|msg: Message, config: Arc<Config>| {
        msg.from
            .as_ref()
            .is_some_and(|user| config.is_admin(user.id))
    })
    .filter_command::<AdminCommand>()
    .endpoint(admin::handle_admin_command);

    let message_handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(commands::handle_command),
        )
        .branch(admin_commands)
        .branch(
            dptree::filter(|msg: Message| msg.chat.is_private())
                .endpoint(messages::handle_private_message),
        );

    dptree::entry()
        .branch(Update::filter_channel_post().endpoint(channel::handle_channel_post))
        .branch(Update::filter_edited_channel_post().endpoint(channel::handle_channel_post))
        .branch(message_handler)
        .branch(Update::filter_callback_query().endpoint(callbacks::handle_callback_query))
        .branch(Update::filter_inline_query().endpoint(inline::handle_inline_query))
}

/// Telegram user ids fit comfortably in the signed column type.
fn db_user_id(user: UserId) -> i64 {
    user.0 as i64
}
