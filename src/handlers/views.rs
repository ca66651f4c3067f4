//! Screens shared by commands, menu buttons and callbacks.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId};
use teloxide::{ApiError, RequestError};

use super::db_user_id;
use crate::db::{BotStats, Database, Page, PopularKind, SearchFilter, VideoRow};
use crate::error::HandlerResult;
use crate::keyboards::{self, CallbackAction};
use crate::session::{LastSearch, SessionStore};

/// Where a screen is drawn: a new message, or in place of the message whose
/// button was pressed.
#[derive(Debug, Clone, Copy)]
pub enum Screen {
    New(ChatId),
    Edit(ChatId, MessageId),
}

impl Screen {
    pub fn chat_id(self) -> ChatId {
        match self {
            Screen::New(chat_id) | Screen::Edit(chat_id, _) => chat_id,
        }
    }
}

pub async fn show(
    bot: &Bot,
    screen: Screen,
    text: impl Into<String>,
    markup: InlineKeyboardMarkup,
) -> HandlerResult {
    match screen {
        Screen::New(chat_id) => {
            bot.send_message(chat_id, text).reply_markup(markup).await?;
        }
        Screen::Edit(chat_id, message_id) => {
            match bot
                .edit_message_text(chat_id, message_id, text)
                .reply_markup(markup)
                .await
            {
                Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

fn page_heading(title: &str, page: &Page<VideoRow>) -> String {
    format!("{title} ({} فيديو)", page.total)
}

pub async fn show_category(
    bot: &Bot,
    db: &Database,
    screen: Screen,
    category_id: Option<i64>,
    page: u32,
) -> HandlerResult {
    let category = match category_id {
        Some(id) => match db.category(id).await? {
            Some(category) => Some(category),
            None => {
                return show(
                    bot,
                    screen,
                    "هذا التصنيف لم يعد موجوداً.",
                    InlineKeyboardMarkup::default(),
                )
                .await
            }
        },
        None => None,
    };
    let children = db.child_categories(category_id).await?;
    let videos = match category_id {
        Some(id) => db.videos_in_category(id, page).await?,
        None => Page {
            items: Vec::new(),
            total: 0,
            page: 0,
        },
    };

    let text = match &category {
        Some(category) => page_heading(&format!("📂 {}", category.full_path), &videos),
        None if children.is_empty() => "لا توجد تصنيفات بعد.".to_string(),
        None => "📂 اختر تصنيفاً:".to_string(),
    };
    let markup = keyboards::category_browser(category.as_ref(), &children, &videos);
    show(bot, screen, text, markup).await
}

/// Records the query as the user's last search (filters reset) and shows
/// the first page of results.
pub async fn start_search(
    bot: &Bot,
    db: &Database,
    sessions: &SessionStore,
    screen: Screen,
    user: UserId,
    query: &str,
) -> HandlerResult {
    let query = query.trim();
    if query.is_empty() {
        bot.send_message(screen.chat_id(), "يرجى كتابة كلمة للبحث.")
            .await?;
        return Ok(());
    }
    sessions
        .set_last_search(
            user,
            LastSearch {
                query: query.to_string(),
                ..LastSearch::default()
            },
        )
        .await;
    show_search_results(bot, db, sessions, screen, user, 0).await
}

pub async fn show_search_results(
    bot: &Bot,
    db: &Database,
    sessions: &SessionStore,
    screen: Screen,
    user: UserId,
    page: u32,
) -> HandlerResult {
    let Some(search) = sessions.last_search(user).await else {
        bot.send_message(screen.chat_id(), "انتهت صلاحية البحث، أرسل كلمة البحث من جديد.")
            .await?;
        return Ok(());
    };

    let filter = SearchFilter {
        quality: search.quality.clone(),
        status: search.status,
        ..SearchFilter::new(search.query.as_str())
    };
    let results = db.search_videos(&filter, page).await?;

    let mut heading = format!("🔍 نتائج البحث عن \"{}\"", search.query);
    if let Some(quality) = &search.quality {
        heading.push_str(&format!(" | {quality}"));
    }
    if let Some(status) = search.status {
        heading.push_str(&format!(" | {status}"));
    }
    let text = if results.is_empty() {
        format!("{heading}\nلم يتم العثور على نتائج.")
    } else {
        page_heading(&heading, &results)
    };

    let markup = keyboards::video_list(&results, CallbackAction::SearchPage)
        .append_row(vec![CallbackAction::FilterMenu.button("⚙️ تصفية النتائج")]);
    show(bot, screen, text, markup).await
}

pub async fn show_favorites(
    bot: &Bot,
    db: &Database,
    screen: Screen,
    user: UserId,
    page: u32,
) -> HandlerResult {
    let favorites = db.favorites(db_user_id(user), page).await?;
    let text = if favorites.is_empty() {
        "قائمة المفضلة فارغة.".to_string()
    } else {
        page_heading("⭐ المفضلة", &favorites)
    };
    show(
        bot,
        screen,
        text,
        keyboards::video_list(&favorites, CallbackAction::Favorites),
    )
    .await
}

pub async fn show_history(
    bot: &Bot,
    db: &Database,
    screen: Screen,
    user: UserId,
    page: u32,
) -> HandlerResult {
    let history = db.history(db_user_id(user), page).await?;
    let text = if history.is_empty() {
        "لم تشاهد أي فيديو بعد.".to_string()
    } else {
        page_heading("🕘 سجل المشاهدة", &history)
    };
    show(
        bot,
        screen,
        text,
        keyboards::video_list(&history, CallbackAction::History),
    )
    .await
}

pub async fn show_popular(
    bot: &Bot,
    db: &Database,
    screen: Screen,
    kind: PopularKind,
) -> HandlerResult {
    let videos = db.popular_videos(kind).await?;
    let title = match kind {
        PopularKind::MostViewed => "👁 الأكثر مشاهدة",
        PopularKind::HighestRated => "⭐ الأعلى تقييماً",
    };
    let text = if videos.is_empty() {
        format!("{title}\nلا توجد بيانات كافية بعد.")
    } else {
        title.to_string()
    };
    let page = Page {
        total: videos.len() as i64,
        items: videos,
        page: 0,
    };
    let markup = keyboards::video_list(&page, |_| CallbackAction::PopularMenu)
        .append_row(vec![CallbackAction::PopularMenu.button("🔙 رجوع")]);
    show(bot, screen, text, markup).await
}

pub fn video_details(video: &VideoRow) -> String {
    let mut text = format!("🎬 {}", video.title());
    match video.metadata() {
        Ok(metadata) if metadata.is_empty() => {}
        Ok(metadata) => {
            if let Some(series) = &metadata.series_name {
                text.push_str(&format!("\n📺 {series}"));
            }
            let summary = metadata.summary();
            if !summary.is_empty() {
                text.push_str(&format!("\n{summary}"));
            }
            if let Some(production) = &metadata.production {
                text.push_str(&format!("\n🏢 إنتاج {production}"));
            }
        }
        Err(e) => log::warn!("Video {} has unreadable metadata: {e}", video.id),
    }
    text.push_str(&format!("\n👁 {} | 🆔 {}", video.view_count, video.id));
    text
}

pub async fn video_action_markup(
    db: &Database,
    video_id: i64,
    user: UserId,
) -> Result<InlineKeyboardMarkup, crate::error::BotError> {
    let user_id = db_user_id(user);
    let rating = db.user_rating(video_id, user_id).await?;
    let favorite = db.is_favorite(user_id, video_id).await?;
    let stats = db.rating_stats(video_id).await?;
    Ok(keyboards::video_actions(video_id, rating, favorite, stats))
}

/// Copies the archived post to the user, counts the view and follows up with
/// the rating / favorite keyboard.
pub async fn send_video(
    bot: &Bot,
    db: &Database,
    chat_id: ChatId,
    user: UserId,
    video: &VideoRow,
) -> HandlerResult {
    let copied = bot
        .copy_message(chat_id, ChatId(video.chat_id), MessageId(video.message_id))
        .await;
    match copied {
        Ok(_) => {}
        Err(RequestError::Api(ApiError::MessageToCopyNotFound)) => {
            log::warn!("Archived message of video {} is gone", video.id);
            bot.send_message(chat_id, "عذراً، هذا الفيديو لم يعد متاحاً.")
                .await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    db.increment_view_count(video.id).await?;
    db.record_view(db_user_id(user), video.id).await?;

    let markup = video_action_markup(db, video.id, user).await?;
    bot.send_message(chat_id, video_details(video))
        .reply_markup(markup)
        .await?;
    Ok(())
}

pub async fn send_random(bot: &Bot, db: &Database, chat_id: ChatId, user: UserId) -> HandlerResult {
    match db.random_video().await? {
        Some(video) => send_video(bot, db, chat_id, user, &video).await,
        None => {
            bot.send_message(chat_id, "لا توجد فيديوهات في الأرشيف حالياً.")
                .await?;
            Ok(())
        }
    }
}

pub fn stats_text(stats: &BotStats) -> String {
    format!(
        "📊 إحصائيات البوت\n\n\
         🎬 الفيديوهات: {}\n\
         📂 التصنيفات: {}\n\
         👥 المستخدمون: {}\n\
         👁 المشاهدات: {}\n\
         ⭐ التقييمات: {}\n\
         ❤️ المفضلة: {}",
        stats.videos, stats.categories, stats.users, stats.views, stats.ratings, stats.favorites
    )
}
