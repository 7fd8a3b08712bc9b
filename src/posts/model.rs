use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A captured post, as produced by the page-capture collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    pub user_name: String,
    #[serde(default)]
    pub user_display_name: String,
    #[serde(default)]
    pub full_text: String,
    pub url: String,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub favorite_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub media: Vec<Media>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    #[serde(rename = "type", default)]
    pub kind: MediaKind,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    AnimatedGif,
    #[default]
    #[serde(other)]
    Unknown,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::AnimatedGif => "animated_gif",
            MediaKind::Unknown => "unknown",
        }
    }
}

/// Timeline payloads use `Wed Oct 10 20:19:24 +0000 2018`; re-exported
/// captures use RFC 3339. Both are accepted.
const LEGACY_TIMESTAMP: &str = "%a %b %d %H:%M:%S %z %Y";

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, LEGACY_TIMESTAMP))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp: {raw}")))
}

/// Parse a JSON array of captured posts.
pub fn parse_posts(json: &str) -> Result<Vec<Post>, serde_json::Error> {
    serde_json::from_str(json)
}
