//! Callback data protocol and the keyboards built on top of it.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

use crate::db::{Category, Page, PopularKind, RatingStats, VideoRow};
use crate::metadata::Status;
use crate::session::LastSearch;

/// Telegram rejects callback data longer than this.
pub const MAX_CALLBACK_LEN: usize = 64;

const SEP: &str = "::";
const ROOT: &str = "root";
const ANY: &str = "any";

pub const QUALITY_CHOICES: [&str; 4] = ["1080p", "720p", "480p", "HD"];

pub const MENU_SEARCH: &str = "🔍 بحث";
pub const MENU_CATEGORIES: &str = "📂 التصنيفات";
pub const MENU_RANDOM: &str = "🎲 فيديو عشوائي";
pub const MENU_FAVORITES: &str = "⭐ المفضلة";
pub const MENU_HISTORY: &str = "🕘 سجل المشاهدة";
pub const MENU_POPULAR: &str = "🔥 الأكثر شعبية";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Noop,
    Browse { category_id: Option<i64>, page: u32 },
    Video(i64),
    Rate { video_id: i64, rating: u8 },
    ToggleFavorite(i64),
    Favorites(u32),
    History(u32),
    SearchPage(u32),
    FilterMenu,
    FilterQuality(Option<String>),
    FilterStatus(Option<Status>),
    PopularMenu,
    Popular(PopularKind),
    Random,
    CheckSubscription,
    Admin(AdminAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAction {
    Panel,
    PickParent,
    AddCategory { parent_id: Option<i64> },
    PickActiveCategory,
    SetActiveCategory(i64),
    MoveVideo,
    MoveVideoTo { video_id: i64, category_id: i64 },
    DeleteVideos,
    PickCategoryToDelete,
    DeleteCategory(i64),
    Rebuild,
    Broadcast,
    Stats,
}

fn encode_opt_id(id: Option<i64>) -> String {
    id.map_or_else(|| ROOT.to_string(), |id| id.to_string())
}

fn parse_opt_id(raw: &str) -> Option<Option<i64>> {
    if raw == ROOT {
        Some(None)
    } else {
        raw.parse().ok().map(Some)
    }
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        let data = match self {
            Self::Noop => "noop".to_string(),
            Self::Browse { category_id, page } => {
                format!("cat{SEP}{}{SEP}{page}", encode_opt_id(*category_id))
            }
            Self::Video(id) => format!("video{SEP}{id}"),
            Self::Rate { video_id, rating } => format!("rate{SEP}{video_id}{SEP}{rating}"),
            Self::ToggleFavorite(id) => format!("fav{SEP}{id}"),
            Self::Favorites(page) => format!("favs{SEP}{page}"),
            Self::History(page) => format!("hist{SEP}{page}"),
            Self::SearchPage(page) => format!("search{SEP}{page}"),
            Self::FilterMenu => "filters".to_string(),
            Self::FilterQuality(quality) => {
                format!("fq{SEP}{}", quality.as_deref().unwrap_or(ANY))
            }
            Self::FilterStatus(status) => {
                format!("fs{SEP}{}", status.map_or(ANY, |s| s.code()))
            }
            Self::PopularMenu => "popular".to_string(),
            Self::Popular(PopularKind::MostViewed) => format!("popular{SEP}views"),
            Self::Popular(PopularKind::HighestRated) => format!("popular{SEP}rating"),
            Self::Random => "random".to_string(),
            Self::CheckSubscription => "subcheck".to_string(),
            Self::Admin(action) => format!("admin{SEP}{}", action.encode()),
        };
        debug_assert!(data.len() <= MAX_CALLBACK_LEN, "callback data too long: {data}");
        data
    }

    /// Unknown or malformed data yields `None`.
    pub fn parse(data: &str) -> Option<Self> {
        let parts: Vec<&str> = data.split(SEP).collect();
        let action = match parts.as_slice() {
            ["noop"] => Self::Noop,
            ["cat", id, page] => Self::Browse {
                category_id: parse_opt_id(id)?,
                page: page.parse().ok()?,
            },
            ["video", id] => Self::Video(id.parse().ok()?),
            ["rate", id, rating] => {
                let rating: u8 = rating.parse().ok()?;
                if !(1..=5).contains(&rating) {
                    return None;
                }
                Self::Rate {
                    video_id: id.parse().ok()?,
                    rating,
                }
            }
            ["fav", id] => Self::ToggleFavorite(id.parse().ok()?),
            ["favs", page] => Self::Favorites(page.parse().ok()?),
            ["hist", page] => Self::History(page.parse().ok()?),
            ["search", page] => Self::SearchPage(page.parse().ok()?),
            ["filters"] => Self::FilterMenu,
            ["fq", quality] if *quality == ANY => Self::FilterQuality(None),
            ["fq", quality] => Self::FilterQuality(Some(quality.to_string())),
            ["fs", status] if *status == ANY => Self::FilterStatus(None),
            ["fs", status] => Self::FilterStatus(Some(Status::from_code(status)?)),
            ["popular"] => Self::PopularMenu,
            ["popular", "views"] => Self::Popular(PopularKind::MostViewed),
            ["popular", "rating"] => Self::Popular(PopularKind::HighestRated),
            ["random"] => Self::Random,
            ["subcheck"] => Self::CheckSubscription,
            ["admin", rest @ ..] => Self::Admin(AdminAction::parse(rest)?),
            _ => return None,
        };
        Some(action)
    }

    pub fn button(&self, text: impl Into<String>) -> InlineKeyboardButton {
        InlineKeyboardButton::callback(text, self.encode())
    }
}

impl AdminAction {
    fn encode(&self) -> String {
        match self {
            Self::Panel => "panel".to_string(),
            Self::PickParent => "parent".to_string(),
            Self::AddCategory { parent_id } => format!("addcat{SEP}{}", encode_opt_id(*parent_id)),
            Self::PickActiveCategory => "active".to_string(),
            Self::SetActiveCategory(id) => format!("setactive{SEP}{id}"),
            Self::MoveVideo => "move".to_string(),
            Self::MoveVideoTo {
                video_id,
                category_id,
            } => format!("moveto{SEP}{video_id}{SEP}{category_id}"),
            Self::DeleteVideos => "delete".to_string(),
            Self::PickCategoryToDelete => "delcats".to_string(),
            Self::DeleteCategory(id) => format!("delcat{SEP}{id}"),
            Self::Rebuild => "rebuild".to_string(),
            Self::Broadcast => "broadcast".to_string(),
            Self::Stats => "stats".to_string(),
        }
    }

    fn parse(parts: &[&str]) -> Option<Self> {
        let action = match parts {
            ["panel"] => Self::Panel,
            ["parent"] => Self::PickParent,
            ["addcat", parent] => Self::AddCategory {
                parent_id: parse_opt_id(parent)?,
            },
            ["active"] => Self::PickActiveCategory,
            ["setactive", id] => Self::SetActiveCategory(id.parse().ok()?),
            ["move"] => Self::MoveVideo,
            ["moveto", video, category] => Self::MoveVideoTo {
                video_id: video.parse().ok()?,
                category_id: category.parse().ok()?,
            },
            ["delete"] => Self::DeleteVideos,
            ["delcats"] => Self::PickCategoryToDelete,
            ["delcat", id] => Self::DeleteCategory(id.parse().ok()?),
            ["rebuild"] => Self::Rebuild,
            ["broadcast"] => Self::Broadcast,
            ["stats"] => Self::Stats,
            _ => return None,
        };
        Some(action)
    }
}

impl From<AdminAction> for CallbackAction {
    fn from(action: AdminAction) -> Self {
        Self::Admin(action)
    }
}

fn truncate_label(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut short: String = text.chars().take(max_chars - 1).collect();
        short.push('…');
        short
    }
}

fn video_button(video: &VideoRow) -> InlineKeyboardButton {
    CallbackAction::Video(video.id).button(format!("🎬 {}", truncate_label(&video.title(), 40)))
}

/// Prev / position / next row for a paginated listing. Empty when everything
/// fits on one page.
fn navigation_row<T>(page: &Page<T>, to_page: impl Fn(u32) -> CallbackAction) -> Vec<InlineKeyboardButton> {
    let mut row = Vec::new();
    if page.total_pages() <= 1 {
        return row;
    }
    if page.has_prev() {
        row.push(to_page(page.page - 1).button("⬅️ السابق"));
    }
    row.push(CallbackAction::Noop.button(format!("{}/{}", page.page + 1, page.total_pages())));
    if page.has_next() {
        row.push(to_page(page.page + 1).button("التالي ➡️"));
    }
    row
}

pub fn video_list(
    page: &Page<VideoRow>,
    to_page: impl Fn(u32) -> CallbackAction,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> =
        page.items.iter().map(|video| vec![video_button(video)]).collect();
    let nav = navigation_row(page, to_page);
    if !nav.is_empty() {
        rows.push(nav);
    }
    InlineKeyboardMarkup::new(rows)
}

/// Subcategories first, then this category's videos, then paging and a way
/// back up the tree.
pub fn category_browser(
    category: Option<&Category>,
    children: &[Category],
    videos: &Page<VideoRow>,
) -> InlineKeyboardMarkup {
    let category_id = category.map(|c| c.id);
    let mut rows: Vec<Vec<InlineKeyboardButton>> = children
        .iter()
        .map(|child| {
            vec![CallbackAction::Browse {
                category_id: Some(child.id),
                page: 0,
            }
            .button(format!("📁 {}", child.name))]
        })
        .collect();
    rows.extend(videos.items.iter().map(|video| vec![video_button(video)]));

    let nav = navigation_row(videos, |page| CallbackAction::Browse { category_id, page });
    if !nav.is_empty() {
        rows.push(nav);
    }
    if let Some(category) = category {
        rows.push(vec![CallbackAction::Browse {
            category_id: category.parent_id,
            page: 0,
        }
        .button("🔙 رجوع")]);
    }
    InlineKeyboardMarkup::new(rows)
}

pub fn video_actions(
    video_id: i64,
    user_rating: Option<u8>,
    is_favorite: bool,
    stats: RatingStats,
) -> InlineKeyboardMarkup {
    let stars = (1..=5u8)
        .map(|rating| {
            let label = if user_rating == Some(rating) {
                format!("⭐{rating}")
            } else {
                rating.to_string()
            };
            CallbackAction::Rate { video_id, rating }.button(label)
        })
        .collect::<Vec<_>>();

    let favorite = if is_favorite {
        "💔 إزالة من المفضلة"
    } else {
        "❤️ إضافة إلى المفضلة"
    };

    let summary = match stats.average {
        Some(average) => format!("التقييم: {average:.1}/5 ({} تقييم)", stats.count),
        None => "لا توجد تقييمات بعد".to_string(),
    };

    InlineKeyboardMarkup::new(vec![
        stars,
        vec![CallbackAction::ToggleFavorite(video_id).button(favorite)],
        vec![CallbackAction::Noop.button(summary)],
    ])
}

pub fn admin_panel() -> InlineKeyboardMarkup {
    let button = |action: AdminAction, text: &str| CallbackAction::from(action).button(text);
    InlineKeyboardMarkup::new(vec![
        vec![
            button(AdminAction::PickParent, "➕ إضافة تصنيف"),
            button(AdminAction::PickActiveCategory, "📌 التصنيف النشط"),
        ],
        vec![
            button(AdminAction::MoveVideo, "🔀 نقل فيديو"),
            button(AdminAction::DeleteVideos, "🗑 حذف فيديوهات"),
        ],
        vec![
            button(AdminAction::PickCategoryToDelete, "❌ حذف تصنيف"),
            button(AdminAction::Rebuild, "♻️ إعادة بناء البيانات"),
        ],
        vec![
            button(AdminAction::Broadcast, "📣 رسالة جماعية"),
            button(AdminAction::Stats, "📊 الإحصائيات"),
        ],
    ])
}

/// One button per category (showing its full path) mapped through `action`.
pub fn category_picker(
    categories: &[Category],
    action: impl Fn(&Category) -> CallbackAction,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = categories
        .iter()
        .map(|category| vec![action(category).button(truncate_label(&category.full_path, 48))])
        .collect();
    rows.push(vec![CallbackAction::from(AdminAction::Panel).button("🔙 لوحة التحكم")]);
    InlineKeyboardMarkup::new(rows)
}

/// Offers the root plus every existing category as the parent of a new one.
pub fn parent_picker(categories: &[Category]) -> InlineKeyboardMarkup {
    let mut rows = vec![vec![CallbackAction::from(AdminAction::AddCategory {
        parent_id: None,
    })
    .button("📁 تصنيف رئيسي")]];
    rows.extend(categories.iter().map(|category| {
        vec![CallbackAction::from(AdminAction::AddCategory {
            parent_id: Some(category.id),
        })
        .button(format!("↳ {}", truncate_label(&category.full_path, 44)))]
    }));
    rows.push(vec![CallbackAction::from(AdminAction::Panel).button("🔙 لوحة التحكم")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn search_filters(current: &LastSearch) -> InlineKeyboardMarkup {
    let mark = |selected: bool, text: &str| {
        if selected {
            format!("✅ {text}")
        } else {
            text.to_string()
        }
    };

    let mut qualities: Vec<InlineKeyboardButton> = QUALITY_CHOICES
        .iter()
        .map(|quality| {
            CallbackAction::FilterQuality(Some(quality.to_string()))
                .button(mark(current.quality.as_deref() == Some(*quality), quality))
        })
        .collect();
    qualities.push(
        CallbackAction::FilterQuality(None).button(mark(current.quality.is_none(), "كل الجودات")),
    );

    let mut statuses: Vec<InlineKeyboardButton> = Status::ALL
        .iter()
        .map(|status| {
            CallbackAction::FilterStatus(Some(*status))
                .button(mark(current.status == Some(*status), status.label()))
        })
        .collect();
    statuses.push(CallbackAction::FilterStatus(None).button(mark(current.status.is_none(), "الكل")));

    InlineKeyboardMarkup::new(vec![
        qualities,
        statuses,
        vec![CallbackAction::SearchPage(0).button("🔍 عرض النتائج")],
    ])
}

pub fn popular_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        CallbackAction::Popular(PopularKind::MostViewed).button("👁 الأكثر مشاهدة"),
        CallbackAction::Popular(PopularKind::HighestRated).button("⭐ الأعلى تقييماً"),
    ]])
}

/// Links to the channels the user still has to join, plus a re-check button.
pub fn subscription_prompt(channels: &[(String, reqwest::Url)]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = channels
        .iter()
        .map(|(name, url)| vec![InlineKeyboardButton::url(format!("📢 {name}"), url.clone())])
        .collect();
    rows.push(vec![CallbackAction::CheckSubscription.button("✅ تحققت من الاشتراك")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn main_menu() -> KeyboardMarkup {
    let row = |texts: [&str; 2]| texts.map(KeyboardButton::new).to_vec();
    KeyboardMarkup::new(vec![
        row([MENU_SEARCH, MENU_CATEGORIES]),
        row([MENU_RANDOM, MENU_POPULAR]),
        row([MENU_FAVORITES, MENU_HISTORY]),
    ])
    .resize_keyboard()
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn callback_data(markup: &InlineKeyboardMarkup) -> Vec<Vec<String>> {
        markup
            .inline_keyboard
            .iter()
            .map(|row| {
                row.iter()
                    .filter_map(|button| match &button.kind {
                        InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .collect()
    }

    fn video(id: i64) -> VideoRow {
        VideoRow {
            id,
            message_id: id as i32,
            caption: Some(format!("clip {id}")),
            chat_id: -100,
            file_name: None,
            file_id: format!("file-{id}"),
            category_id: None,
            metadata: "{}".into(),
            view_count: 0,
            grouping_key: None,
            upload_date: String::new(),
        }
    }

    #[test]
    fn parses_what_it_encodes() {
        let actions = [
            CallbackAction::Browse {
                category_id: None,
                page: 3,
            },
            CallbackAction::Browse {
                category_id: Some(-7),
                page: 0,
            },
            CallbackAction::Rate {
                video_id: 12,
                rating: 5,
            },
            CallbackAction::FilterQuality(Some("720p".into())),
            CallbackAction::FilterStatus(Some(Status::Dubbed)),
            CallbackAction::FilterStatus(None),
            CallbackAction::Popular(PopularKind::HighestRated),
            AdminAction::MoveVideoTo {
                video_id: 1,
                category_id: 2,
            }
            .into(),
            AdminAction::AddCategory { parent_id: Some(9) }.into(),
        ];
        for action in actions {
            assert_eq!(CallbackAction::parse(&action.encode()), Some(action));
        }
    }

    #[test]
    fn rejects_unknown_or_malformed_data() {
        assert_eq!(CallbackAction::parse(""), None);
        assert_eq!(CallbackAction::parse("delete_abc"), None);
        assert_eq!(CallbackAction::parse("video::x"), None);
        assert_eq!(CallbackAction::parse("rate::1::9"), None);
        assert_eq!(CallbackAction::parse("fs::unknown"), None);
        assert_eq!(CallbackAction::parse("admin::nuke"), None);
        assert_eq!(CallbackAction::parse("video::1::2"), None);
    }

    #[test]
    fn longest_payload_fits_telegram_limit() {
        let action: CallbackAction = AdminAction::MoveVideoTo {
            video_id: i64::MIN,
            category_id: i64::MIN,
        }
        .into();
        assert!(action.encode().len() <= MAX_CALLBACK_LEN);
    }

    #[test]
    fn single_page_has_no_navigation() {
        let page = Page {
            items: vec![video(1), video(2)],
            total: 2,
            page: 0,
        };
        let markup = video_list(&page, CallbackAction::Favorites);
        assert_eq!(markup.inline_keyboard.len(), 2);
    }

    #[test]
    fn middle_page_links_both_ways() {
        let page = Page {
            items: vec![video(11)],
            total: 25,
            page: 1,
        };
        let markup = video_list(&page, CallbackAction::History);
        let data = callback_data(&markup);
        assert_eq!(data[0], vec!["video::11"]);
        assert_eq!(data[1], vec!["hist::0", "noop", "hist::2"]);
    }

    #[test]
    fn current_rating_is_marked() {
        let markup = video_actions(4, Some(3), true, RatingStats::default());
        let labels: Vec<&str> = markup.inline_keyboard[0]
            .iter()
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(labels, vec!["1", "2", "⭐3", "4", "5"]);
        assert_eq!(callback_data(&markup)[1], vec!["fav::4"]);
    }

    #[test]
    fn browser_offers_a_way_back_up() {
        let parent = Category {
            id: 5,
            name: "Action".into(),
            parent_id: Some(1),
            full_path: "Movies/Action".into(),
        };
        let empty = Page {
            items: vec![],
            total: 0,
            page: 0,
        };
        let markup = category_browser(Some(&parent), &[], &empty);
        assert_eq!(callback_data(&markup), vec![vec!["cat::1::0".to_string()]]);
    }

    #[test]
    fn long_labels_are_shortened() {
        assert_eq!(truncate_label("abc", 5), "abc");
        assert_eq!(truncate_label("abcdefgh", 5), "abcd…");
    }
}
