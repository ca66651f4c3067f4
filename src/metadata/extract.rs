use once_cell::sync::Lazy;
use regex::Regex;

use super::ordinal::arabic_word_to_int;
use super::{Status, VideoMetadata};

static SUBTITLED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)مترجم|subbed|sub").unwrap());
static DUBBED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)مدبلج|dubbed|dub").unwrap());
static NARRATED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"متحدث عربي").unwrap());

/// Pixel height ("720p"), "HD", or "4K"/"8K".
static QUALITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{3,4}[pP])|([Hh][Dd])|([48][Kk])").unwrap());

static SEASON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:الموسم|season|S)\s*(\d+)|الموسم\s+([^\s\d]+)").unwrap()
});

// Same shape as the season pattern; a digit run directly followed by "p" is
// rejected in `find_episode`, since "720p" is a resolution.
static EPISODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:الحلقة|episode|E)\s*(\d+)|الحلقة\s+([^\s\d]+)").unwrap()
});

static FINAL_EPISODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"الاخيرة|الأخيرة").unwrap());

static NAME_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:مسلسل|فيلم|series|movie)\s+([^\n#|]+)").unwrap());

static LEADING_NOISE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\s\W_-]+").unwrap());

// Case-sensitive: the lone "S"/"E" alternatives must not match lowercase words.
static SEASON_EPISODE_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(الحلقة|الموسم|episode|season|S|E)\s*(\d+|[^\s\d]+)").unwrap());

static STOPWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(مترجم|مدبلج|عربي|HD|1080p|720p|480p|360p|جودة عالية|جودة متعددة)\b").unwrap()
});

static TRAILING_NOISE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\W_-]+$").unwrap());
static MULTI_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

static PRODUCTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)إنتاج\s+([^\n|]+)").unwrap());

/// The token and stopword passes each remove at most this many occurrences.
const MAX_STRIPS_PER_PASS: usize = 2;

/// Parses a caption (and the uploaded file name) into structured fields.
///
/// Best effort: anything that doesn't match is simply left out, so the
/// result may be empty. The caption alone feeds the title and production;
/// every other field is searched in `caption + " " + file_name`.
pub fn extract_video_metadata(caption: Option<&str>, file_name: Option<&str>) -> VideoMetadata {
    let caption = caption.unwrap_or_default();
    let text = format!("{} {}", caption, file_name.unwrap_or_default());

    VideoMetadata {
        status: find_status(&text),
        quality_resolution: find_quality(&text),
        season_number: find_season(&text),
        episode_number: find_episode(&text),
        is_final_episode: FINAL_EPISODE_RE.is_match(&text).then_some(true),
        series_name: clean_title(caption),
        production: find_production(caption),
        duration: None,
    }
}

fn find_status(text: &str) -> Option<Status> {
    if SUBTITLED_RE.is_match(text) {
        Some(Status::Subtitled)
    } else if DUBBED_RE.is_match(text) {
        Some(Status::Dubbed)
    } else if NARRATED_RE.is_match(text) {
        Some(Status::Narrated)
    } else {
        None
    }
}

fn find_quality(text: &str) -> Option<String> {
    QUALITY_RE
        .find(text)
        .map(|m| m.as_str().to_uppercase().replace('P', "p"))
}

fn find_season(text: &str) -> Option<u32> {
    let caps = SEASON_RE.captures(text)?;
    match caps.get(1) {
        Some(digits) => parse_number(digits.as_str()),
        None => caps.get(2).and_then(|word| arabic_word_to_int(word.as_str())),
    }
}

fn find_episode(text: &str) -> Option<u32> {
    let mut start = 0;
    while let Some(caps) = EPISODE_RE.captures_at(text, start) {
        let Some(digits) = caps.get(1) else {
            return caps.get(2).and_then(|word| arabic_word_to_int(word.as_str()));
        };
        if !followed_by_p(text, digits.end()) {
            return parse_number(digits.as_str());
        }
        // Retry from the next character, the way a backtracking search would.
        let matched_at = caps.get(0).map_or(digits.start(), |m| m.start());
        start = matched_at + text[matched_at..].chars().next().map_or(1, char::len_utf8);
    }
    None
}

fn followed_by_p(text: &str, at: usize) -> bool {
    matches!(text[at..].chars().next(), Some('p' | 'P'))
}

static DECIMAL_DIGIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d$").unwrap());

/// Parses a run of decimal digits from any script the patterns match.
/// Overflowing values are dropped rather than wrapped.
fn parse_number(digits: &str) -> Option<u32> {
    digits.chars().try_fold(0u32, |acc, c| {
        acc.checked_mul(10)?.checked_add(decimal_value(c)?)
    })
}

fn is_decimal_digit(c: char) -> bool {
    let mut buf = [0u8; 4];
    DECIMAL_DIGIT_RE.is_match(c.encode_utf8(&mut buf))
}

/// Decimal digits are encoded as contiguous zero-to-nine runs, so a digit's
/// value is its distance from the start of its run, modulo ten.
fn decimal_value(c: char) -> Option<u32> {
    if let Some(digit) = c.to_digit(10) {
        return Some(digit);
    }
    if !is_decimal_digit(c) {
        return None;
    }
    let mut start = c as u32;
    while let Some(prev) = start
        .checked_sub(1)
        .and_then(char::from_u32)
        .filter(|&prev| is_decimal_digit(prev))
    {
        start = prev as u32;
    }
    Some((c as u32 - start) % 10)
}

/// Drops the leading run of digits, whitespace and punctuation ("01 - ",
/// "🎬 ", "#12 ").
pub(crate) fn strip_leading_noise(text: &str) -> &str {
    match LEADING_NOISE_RE.find(text) {
        Some(m) => text[m.end()..].trim(),
        None => text.trim(),
    }
}

fn clean_title(caption: &str) -> Option<String> {
    let raw = match NAME_MARKER_RE.captures(caption).and_then(|caps| caps.get(1)) {
        Some(m) => m.as_str(),
        None => caption.split('\n').next().unwrap_or_default(),
    };
    if raw.is_empty() {
        return None;
    }

    let name = strip_leading_noise(raw);
    let name = SEASON_EPISODE_TOKEN_RE.replacen(name, MAX_STRIPS_PER_PASS, "");
    let name = STOPWORD_RE.replacen(name.trim(), MAX_STRIPS_PER_PASS, "");
    let name = TRAILING_NOISE_RE.replace(name.trim(), "");
    let name = MULTI_SPACE_RE.replace_all(name.trim(), " ");
    let name = name.trim();

    (!name.is_empty()).then(|| name.to_string())
}

fn find_production(caption: &str) -> Option<String> {
    let caps = PRODUCTION_RE.captures(caption)?;
    let production = caps.get(1)?.as_str().trim();
    (!production.is_empty()).then(|| production.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(caption: &str) -> VideoMetadata {
        extract_video_metadata(Some(caption), None)
    }

    #[test]
    fn arabic_series_caption() {
        let metadata = parse("مسلسل فلان الموسم الثاني الحلقة 5 مترجم 1080p");

        assert_eq!(metadata.series_name.as_deref(), Some("فلان"));
        assert_eq!(metadata.season_number, Some(2));
        assert_eq!(metadata.episode_number, Some(5));
        assert_eq!(metadata.status, Some(Status::Subtitled));
        assert_eq!(metadata.quality_resolution.as_deref(), Some("1080p"));
        assert_eq!(metadata.is_final_episode, None);
    }

    #[test]
    fn empty_input_gives_empty_metadata() {
        assert!(extract_video_metadata(None, None).is_empty());
        assert!(extract_video_metadata(Some(""), Some("")).is_empty());
        assert!(parse("   \n  ").is_empty());
    }

    #[test]
    fn subtitle_marker_wins_over_dubbed() {
        assert_eq!(parse("فيلم مدبلج و مترجم").status, Some(Status::Subtitled));
        assert_eq!(parse("Cars DUBBED").status, Some(Status::Dubbed));
        assert_eq!(parse("وثائقي متحدث عربي").status, Some(Status::Narrated));
        assert_eq!(parse("وثائقي متحدث").status, None);
    }

    #[test]
    fn quality_keeps_lowercase_p() {
        assert_eq!(parse("x 720p").quality_resolution.as_deref(), Some("720p"));
        assert_eq!(parse("x 720P").quality_resolution.as_deref(), Some("720p"));
        assert_eq!(parse("x 4k").quality_resolution.as_deref(), Some("4K"));
        assert_eq!(parse("x hd").quality_resolution.as_deref(), Some("HD"));
        assert_eq!(parse("no quality here").quality_resolution, None);
    }

    #[test]
    fn quality_is_also_read_from_file_name() {
        let metadata = extract_video_metadata(Some("فيلم"), Some("film.2160p.mkv"));
        assert_eq!(metadata.quality_resolution.as_deref(), Some("2160p"));
    }

    #[test]
    fn resolution_is_not_an_episode_number() {
        let metadata = parse("الحلقة 720p");
        assert_ne!(metadata.episode_number, Some(720));
        assert_eq!(metadata.quality_resolution.as_deref(), Some("720p"));
    }

    #[test]
    fn episode_found_after_a_rejected_resolution_match() {
        let metadata = parse("E 480p الحلقة 7");
        assert_eq!(metadata.episode_number, Some(7));
    }

    #[test]
    fn latin_season_and_episode_tokens() {
        let metadata = extract_video_metadata(Some("Breaking Bad"), Some("Breaking.Bad.S01E05.mkv"));
        assert_eq!(metadata.season_number, Some(1));
        assert_eq!(metadata.episode_number, Some(5));

        let metadata = parse("Dark Season 3 Episode 8");
        assert_eq!(metadata.season_number, Some(3));
        assert_eq!(metadata.episode_number, Some(8));
    }

    #[test]
    fn ordinal_words_resolve_and_unknown_words_are_dropped() {
        assert_eq!(parse("الموسم الأول").season_number, Some(1));
        assert_eq!(parse("الحلقة العاشرة").episode_number, Some(10));
        assert_eq!(parse("الموسم الجديد").season_number, None);
        assert_eq!(parse("الحلقة الخاصة").episode_number, None);
    }

    #[test]
    fn arabic_indic_digits_are_numbers() {
        assert_eq!(parse("الحلقة ١٢").episode_number, Some(12));
        assert_eq!(parse("الموسم ۳").season_number, Some(3));
    }

    #[test]
    fn digits_from_other_scripts_are_numbers() {
        assert_eq!(parse("الحلقة ५").episode_number, Some(5));
        assert_eq!(parse("Season ๒ Episode ๑๐").season_number, Some(2));
        assert_eq!(parse("Season ๒ Episode ๑๐").episode_number, Some(10));
        assert_eq!(parse_number("𝟗"), Some(9));
        assert_eq!(parse_number("x1"), None);
    }

    #[test]
    fn oversized_numbers_are_dropped() {
        assert_eq!(parse("الحلقة 99999999999999999999").episode_number, None);
    }

    #[test]
    fn final_episode_flag_is_true_or_absent() {
        assert_eq!(parse("الحلقة 30 والأخيرة").is_final_episode, Some(true));
        assert_eq!(parse("الحلقة الاخيرة").is_final_episode, Some(true));
        assert_eq!(parse("الحلقة 29").is_final_episode, None);

        let json = serde_json::to_value(parse("الحلقة 29")).unwrap();
        assert!(json.get("is_final_episode").is_none());
    }

    #[test]
    fn title_falls_back_to_first_line() {
        let metadata = parse("01 - Inception 720p\nإنتاج Warner Bros | 2010");
        assert_eq!(metadata.series_name.as_deref(), Some("Inception"));
        assert_eq!(metadata.production.as_deref(), Some("Warner Bros"));
    }

    #[test]
    fn title_stops_at_hash_and_pipe() {
        let metadata = parse("🎬 فيلم The Matrix #اكشن");
        assert_eq!(metadata.series_name.as_deref(), Some("The Matrix"));

        let metadata = parse("series Dark | Netflix");
        assert_eq!(metadata.series_name.as_deref(), Some("Dark"));
    }

    #[test]
    fn title_that_cleans_to_nothing_is_omitted() {
        let metadata = parse("123 - !!");
        assert_eq!(metadata.series_name, None);

        let metadata = parse("مترجم 720p");
        assert_eq!(metadata.series_name, None);
        assert_eq!(metadata.status, Some(Status::Subtitled));
    }

    #[test]
    fn internal_whitespace_is_collapsed() {
        let metadata = parse("مسلسل  باب   الحارة الحلقة 3");
        assert_eq!(metadata.series_name.as_deref(), Some("باب الحارة"));
    }

    #[test]
    fn production_needs_text_after_marker() {
        assert_eq!(parse("إنتاج   روتانا  ").production.as_deref(), Some("روتانا"));
        assert_eq!(parse("بدون انتاج").production, None);
    }

    #[test]
    fn parsing_is_deterministic() {
        let caption = "مسلسل الهيبة الموسم الرابع الحلقة 12 مدبلج HD";
        let first = extract_video_metadata(Some(caption), Some("alhayba.mp4"));
        let second = extract_video_metadata(Some(caption), Some("alhayba.mp4"));
        assert_eq!(first, second);
    }

    #[test]
    fn strip_leading_noise_keeps_the_title() {
        assert_eq!(strip_leading_noise("  007 The Matrix"), "The Matrix");
        assert_eq!(strip_leading_noise("- #12 :: Dune"), "Dune");
        assert_eq!(strip_leading_noise("12345"), "");
    }
}
