//! Caption metadata: the structured fields pulled out of a free-text caption
//! and the grouping key derived from them.

mod extract;
mod grouping;
mod ordinal;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use extract::extract_video_metadata;
pub use grouping::build_grouping_key;

/// Whether a video is subtitled, dubbed or narrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "مترجم")]
    Subtitled,
    #[serde(rename = "مدبلج")]
    Dubbed,
    #[serde(rename = "متحدث")]
    Narrated,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Subtitled, Status::Dubbed, Status::Narrated];

    /// The label stored in the metadata document.
    pub fn label(self) -> &'static str {
        match self {
            Status::Subtitled => "مترجم",
            Status::Dubbed => "مدبلج",
            Status::Narrated => "متحدث",
        }
    }

    /// Short ASCII code, used where space is tight (callback data).
    pub fn code(self) -> &'static str {
        match self {
            Status::Subtitled => "sub",
            Status::Dubbed => "dub",
            Status::Narrated => "nar",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fields parsed out of a caption.
///
/// Every field is optional and absent fields are left out of the serialized
/// document entirely, so readers must check for presence rather than `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_number: Option<u32>,
    /// Only ever `Some(true)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_final_episode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production: Option<String>,
    /// Filled in at ingestion from the Telegram video, never by the parser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

impl VideoMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// One-line human summary used in result descriptions.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(season) = self.season_number {
            parts.push(format!("S{season:02}"));
        }
        if let Some(episode) = self.episode_number {
            parts.push(format!("E{episode:02}"));
        }
        if self.is_final_episode == Some(true) {
            parts.push("الأخيرة".to_string());
        }
        if let Some(quality) = &self.quality_resolution {
            parts.push(quality.clone());
        }
        if let Some(status) = self.status {
            parts.push(status.label().to_string());
        }
        parts.join(" | ")
    }
}
