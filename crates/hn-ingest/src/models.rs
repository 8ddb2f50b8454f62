//! Remote payloads and the decoded story handed to the reconciler

use hn_common::types::{DEFAULT_AUTHOR, DEFAULT_TITLE};
use hn_common::Story;
use serde::Deserialize;

/// Item kind accepted by the pipeline. Comments, jobs and polls share the
/// same id space and are skipped.
pub const STORY_KIND: &str = "story";

/// Raw item from the detail endpoint. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct HnItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub score: Option<i32>,
    pub url: Option<String>,
    pub by: Option<String>,
    pub time: Option<i64>,
    pub descendants: Option<i32>,
}

impl HnItem {
    /// Decode a detail payload. Only the `type` tag is read for items that
    /// are not stories, so a `null` body or a malformed comment is `None`
    /// rather than an error.
    pub fn from_value(value: serde_json::Value) -> Result<Option<Self>, serde_json::Error> {
        if value.get("type").and_then(serde_json::Value::as_str) != Some(STORY_KIND) {
            return Ok(None);
        }
        serde_json::from_value(value).map(Some)
    }

    /// Convert into a [`FetchedStory`], or `None` when the item is not a story.
    pub fn into_story(self) -> Option<FetchedStory> {
        if self.kind.as_deref() != Some(STORY_KIND) {
            return None;
        }

        Some(FetchedStory {
            id: self.id,
            title: self.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            score: self.score,
            url: self.url,
            author: self.by.unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            time: self.time,
            descendants: self.descendants,
        })
    }
}

/// A story as fetched during this run, before reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedStory {
    pub id: i64,
    pub title: String,
    pub score: Option<i32>,
    pub url: Option<String>,
    pub author: String,
    pub time: Option<i64>,
    pub descendants: Option<i32>,
}

impl FetchedStory {
    pub fn to_story(&self) -> Story {
        Story {
            id: self.id,
            title: Some(self.title.clone()),
            score: self.score,
            url: self.url.clone(),
            author: Some(self.author.clone()),
            time: self.time,
            descendants: self.descendants,
            kind: Some(STORY_KIND.to_string()),
        }
    }
}
