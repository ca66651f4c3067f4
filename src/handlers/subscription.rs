use reqwest::Url;
use teloxide::prelude::*;
use teloxide::{ApiError, RequestError};

use crate::config::Config;
use crate::db::{Database, RequiredChannel};
use crate::error::BotError;
use crate::keyboards;

pub const PROMPT_TEXT: &str = "يرجى الاشتراك في القنوات التالية لاستخدام البوت:";

/// Link shown on the join button. Private channels only have the `t.me/c/`
/// form, which works for users who can already see them.
pub fn channel_link(channel: &RequiredChannel) -> Option<Url> {
    let id = channel.channel_id.to_string();
    let link = match id.strip_prefix("-100") {
        Some(internal) => format!("https://t.me/c/{internal}"),
        None => format!("https://t.me/{}", channel.channel_name.trim_start_matches('@')),
    };
    Url::parse(&link).ok()
}

/// Required channels the user hasn't joined. Channels the bot can't inspect
/// are skipped rather than locking everyone out.
pub async fn missing_channels(
    bot: &Bot,
    db: &Database,
    user: UserId,
) -> Result<Vec<RequiredChannel>, BotError> {
    let mut missing = Vec::new();
    for channel in db.required_channels().await? {
        match bot.get_chat_member(ChatId(channel.channel_id), user).await {
            Ok(member) if member.is_present() => {}
            Ok(_) | Err(RequestError::Api(ApiError::UserNotFound)) => missing.push(channel),
            Err(RequestError::Api(
                ApiError::ChatNotFound | ApiError::BotKicked | ApiError::BotKickedFromSupergroup,
            )) => {
                log::warn!(
                    "Cannot verify membership in channel {}; skipping it",
                    channel.channel_id
                );
            }
            Err(RequestError::Api(ApiError::Unknown(text)))
                if text.contains("member list is inaccessible") || text.contains("not a member") =>
            {
                log::error!(
                    "Bot has no access to members of channel {}: {text}",
                    channel.channel_id
                );
            }
            Err(e) => {
                log::warn!("Subscription check for user {user} failed: {e}");
                missing.push(channel);
            }
        }
    }
    Ok(missing)
}

/// Admins always pass. Anyone else missing a channel gets the join prompt
/// and `false`.
pub async fn ensure_subscribed(
    bot: &Bot,
    db: &Database,
    config: &Config,
    chat_id: ChatId,
    user: UserId,
) -> Result<bool, BotError> {
    if config.is_admin(user) {
        return Ok(true);
    }
    let missing = missing_channels(bot, db, user).await?;
    if missing.is_empty() {
        return Ok(true);
    }
    bot.send_message(chat_id, PROMPT_TEXT)
        .reply_markup(prompt_markup(&missing))
        .await?;
    Ok(false)
}

pub fn prompt_markup(missing: &[RequiredChannel]) -> teloxide::types::InlineKeyboardMarkup {
    let links: Vec<(String, Url)> = missing
        .iter()
        .filter_map(|channel| {
            let link = channel_link(channel);
            if link.is_none() {
                log::error!("Could not build a link for channel {}", channel.channel_id);
            }
            link.map(|url| (channel.channel_name.clone(), url))
        })
        .collect();
    keyboards::subscription_prompt(&links)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_channels_link_by_name() {
        let channel = RequiredChannel {
            channel_id: 12345,
            channel_name: "@news_channel".into(),
        };
        assert_eq!(
            channel_link(&channel).map(String::from),
            Some("https://t.me/news_channel".to_string())
        );
    }

    #[test]
    fn supergroup_ids_use_the_internal_link() {
        let channel = RequiredChannel {
            channel_id: -1001234567890,
            channel_name: "Private".into(),
        };
        assert_eq!(
            channel_link(&channel).map(String::from),
            Some("https://t.me/c/1234567890".to_string())
        );
    }

    #[test]
    fn prompt_ends_with_recheck_button() {
        let markup = prompt_markup(&[RequiredChannel {
            channel_id: 1,
            channel_name: "a".into(),
        }]);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[1][0].text, "✅ تحققت من الاشتراك");
    }
}
