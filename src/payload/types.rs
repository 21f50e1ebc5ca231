//! Notification payload types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payload version emitted by this writer.
pub const PAYLOAD_VERSION: &str = "1.1";

/// Version assumed when a payload does not state one.
pub const LEGACY_VERSION: &str = "1.0";

/// Why a notification was sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reason {
    /// Regular content update.
    #[default]
    #[serde(rename = "update", alias = "feed_update")]
    Update,
    /// Feed going live.
    #[serde(rename = "live")]
    Live,
    /// Live stream ended.
    #[serde(rename = "liveEnd")]
    LiveEnd,
}

impl Reason {
    pub const ALL: [Reason; 3] = [Reason::Update, Reason::Live, Reason::LiveEnd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Update => "update",
            Reason::Live => "live",
            Reason::LiveEnd => "liveEnd",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update" | "feed_update" => Ok(Reason::Update),
            "live" => Ok(Reason::Live),
            "liveEnd" => Ok(Reason::LiveEnd),
            other => Err(format!("unknown reason '{}'", other)),
        }
    }
}

/// Kind of content behind the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Medium {
    #[default]
    Podcast,
    Music,
    Video,
    Film,
    Audiobook,
    Newsletter,
    Blog,
}

impl Medium {
    pub const ALL: [Medium; 7] = [
        Medium::Podcast,
        Medium::Music,
        Medium::Video,
        Medium::Film,
        Medium::Audiobook,
        Medium::Newsletter,
        Medium::Blog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Medium::Podcast => "podcast",
            Medium::Music => "music",
            Medium::Video => "video",
            Medium::Film => "film",
            Medium::Audiobook => "audiobook",
            Medium::Newsletter => "newsletter",
            Medium::Blog => "blog",
        }
    }
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Medium {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Medium::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown medium '{}'", s))
    }
}

/// Payload as written to the chain.
///
/// Field order is the wire order; size accounting in the codec relies on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    pub version: String,
    pub medium: Medium,
    pub reason: Reason,
    pub iris: Vec<String>,
    pub timestamp_ns: u64,
    pub session_id: u64,
}

/// Either a single URL or a list of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum UrlField {
    One(String),
    Many(Vec<String>),
}

impl UrlField {
    /// An empty string yields no URLs.
    pub(crate) fn into_vec(self) -> Vec<String> {
        match self {
            UrlField::One(url) if url.is_empty() => Vec::new(),
            UrlField::One(url) => vec![url],
            UrlField::Many(urls) => urls,
        }
    }
}

/// Payload as read from the chain, tolerant of every published version.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawPayload {
    #[serde(default)]
    pub version: Option<serde_json::Value>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    /// Version 1.1 name of the URL list.
    #[serde(default)]
    pub iris: Option<UrlField>,
    /// Version 1.0 name of the URL list.
    #[serde(default)]
    pub urls: Option<UrlField>,
}
