//! Stories feature: read-only access to reconciled stories

pub mod queries;
pub mod routes;

pub use routes::stories_routes;

use hn_common::Story;
use serde::Serialize;

/// A story as returned by the API, with its creation time formatted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoryResponse {
    #[serde(flatten)]
    pub story: Story,
    pub readable_time: Option<String>,
}

impl From<Story> for StoryResponse {
    fn from(story: Story) -> Self {
        let readable_time = story.readable_time();
        Self {
            story,
            readable_time,
        }
    }
}

/// Escape LIKE metacharacters and wrap for a substring match.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes() {
        assert_eq!(contains_pattern("rust"), "%rust%");
        assert_eq!(contains_pattern("100%_\\"), "%100\\%\\_\\\\%");
    }

    #[test]
    fn test_story_response_flattens() {
        let story = Story {
            id: 1,
            title: Some("t".to_string()),
            score: Some(3),
            url: None,
            author: Some("pg".to_string()),
            time: Some(1_700_000_000),
            descendants: None,
            kind: Some("story".to_string()),
        };
        let value = serde_json::to_value(StoryResponse::from(story)).unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(value["type"], "story");
        assert_eq!(value["readable_time"], "2023-11-14 22:13:20");
    }
}
