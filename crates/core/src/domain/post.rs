// Post Domain Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mapper::wire::{int_string, timestamp};
use crate::mapper::{ColumnDef, EntitySchema, Fields, MappingError, Record, SqlType};

/// Post ID (store-assigned rowid)
pub type PostId = i64;

/// Post Entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Post {
    #[serde(with = "int_string")]
    pub id: PostId,
    pub title: String,
    pub text: String,
    /// Normalized tag names, sorted
    pub tags: Vec<String>,
    #[serde(with = "int_string")]
    pub likes_count: i64,
    #[serde(with = "int_string")]
    pub comments_count: i64,
    /// Optimistic lock counter, bumped by every update
    #[serde(with = "int_string")]
    pub version: i64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

pub static POST_SCHEMA: EntitySchema = EntitySchema {
    table: "posts",
    columns: &[
        ColumnDef::stored("id", SqlType::Integer),
        ColumnDef::stored("title", SqlType::Text),
        ColumnDef::stored("text", SqlType::Text),
        ColumnDef::stored("likes_count", SqlType::Integer),
        ColumnDef::stored("version", SqlType::Integer),
        ColumnDef::stored("created_at", SqlType::Timestamp),
        ColumnDef::stored("updated_at", SqlType::Timestamp),
        ColumnDef::derived("comments_count", SqlType::Integer),
    ],
};

impl Record for Post {
    fn schema() -> &'static EntitySchema {
        &POST_SCHEMA
    }

    // Tags live in their own table; the repository attaches them with `with_tags`
    fn from_fields(fields: &Fields<'_>) -> Result<Self, MappingError> {
        Ok(Post {
            id: fields.i64("id")?,
            title: fields.text("title")?,
            text: fields.text("text")?,
            tags: Vec::new(),
            likes_count: fields.i64("likes_count")?,
            comments_count: fields.i64("comments_count")?,
            version: fields.i64("version")?,
            created_at: fields.timestamp("created_at")?,
            updated_at: fields.timestamp("updated_at")?,
        })
    }
}

impl Post {
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = normalize_tags(&tags);
        self
    }
}

/// Input for creating a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub text: String,
    pub tags: Vec<String>,
}

/// Full replacement of a post's editable fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPatch {
    pub title: String,
    pub text: String,
    pub tags: Vec<String>,
    /// When set, the update only applies if the stored version still matches
    pub expected_version: Option<i64>,
}

/// Sort order for post listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostOrder {
    /// Newest first (default)
    #[default]
    Newest,
    Oldest,
    Title,
    MostLiked,
}

/// Post listing filter, usually parsed from a free-text search box
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    /// Case-insensitive substring of the title
    pub title_query: Option<String>,
    /// Every tag must be present on the post
    pub tags: Vec<String>,
    pub order: PostOrder,
}

impl PostFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse a search string: `#tag` words filter by tag, the rest match the title.
    ///
    /// ```text
    /// "rust async #tokio #Web" -> title ~ "rust async", tags = [tokio, web]
    /// ```
    pub fn parse(search: &str) -> Self {
        let mut words = Vec::new();
        let mut tags = Vec::new();

        for part in search.split_whitespace() {
            match part.strip_prefix('#') {
                Some(tag) if !tag.is_empty() => tags.push(tag.to_lowercase()),
                _ => words.push(part),
            }
        }

        Self {
            title_query: (!words.is_empty()).then(|| words.join(" ")),
            tags: normalize_tags(&tags),
            order: PostOrder::default(),
        }
    }

    pub fn ordered_by(mut self, order: PostOrder) -> Self {
        self.order = order;
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        self.title_query.is_none() && self.tags.is_empty()
    }
}

/// Trim, lowercase, drop blanks and duplicates; result is sorted
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{record_to_wire, row_to_record, wire_to_record, Row, SqlValue};
    use chrono::TimeZone;

    fn post_row() -> Row {
        Row::new()
            .with("id", 42_i64)
            .with("title", "Hello")
            .with("text", "Body")
            .with("likes_count", 3_i64)
            .with("version", 1_i64)
            .with("created_at", "2024-01-01T00:00:00.000000Z")
            .with("updated_at", "2024-01-02T00:00:00.000000Z")
            .with("comments_count", 2_i64)
    }

    #[test]
    fn test_post_from_row() {
        let post: Post = row_to_record(&post_row()).unwrap();
        assert_eq!(post.id, 42);
        assert_eq!(post.title, "Hello");
        assert_eq!(post.comments_count, 2);
        assert!(post.tags.is_empty());
        assert_eq!(
            post.created_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_post_from_row_missing_derived_column() {
        let row = Row::new()
            .with("id", 42_i64)
            .with("title", "Hello")
            .with("text", "Body")
            .with("likes_count", 3_i64)
            .with("version", 1_i64)
            .with("created_at", "2024-01-01T00:00:00Z")
            .with("updated_at", SqlValue::Null);
        assert!(matches!(
            row_to_record::<Post>(&row),
            Err(MappingError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_post_wire_round_trip() {
        let post: Post = row_to_record(&post_row()).unwrap();
        let post = post.with_tags(vec!["Rust".into(), "async".into()]);

        let wire = record_to_wire(&post).unwrap();
        assert_eq!(wire["id"], "42");
        assert_eq!(wire["likesCount"], "3");
        assert_eq!(wire["tags"], serde_json::json!(["async", "rust"]));

        let back: Post = wire_to_record(&wire).unwrap();
        assert_eq!(back, post);
    }

    #[test]
    fn test_parse_search() {
        let filter = PostFilter::parse("  rust   async #Tokio #web # ");
        assert_eq!(filter.title_query.as_deref(), Some("rust async #"));
        assert_eq!(filter.tags, vec!["tokio", "web"]);
        assert_eq!(filter.order, PostOrder::Newest);
    }

    #[test]
    fn test_parse_empty_search() {
        let filter = PostFilter::parse("   ");
        assert!(filter.is_unfiltered());
        assert_eq!(filter, PostFilter::all());
    }

    #[test]
    fn test_normalize_tags() {
        let tags = vec![
            " Java ".to_string(),
            "spring".to_string(),
            "JAVA".to_string(),
            "  ".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["java", "spring"]);
    }
}
