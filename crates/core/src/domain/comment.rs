// Comment Domain Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PostId;
use crate::mapper::wire::{int_string, timestamp};
use crate::mapper::{ColumnDef, EntitySchema, Fields, MappingError, Record, SqlType};

/// Comment ID (store-assigned rowid)
pub type CommentId = i64;

/// Comment Entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Comment {
    #[serde(with = "int_string")]
    pub id: CommentId,
    #[serde(with = "int_string")]
    pub post_id: PostId,
    pub text: String,
    #[serde(with = "int_string")]
    pub version: i64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

pub static COMMENT_SCHEMA: EntitySchema = EntitySchema {
    table: "comments",
    columns: &[
        ColumnDef::stored("id", SqlType::Integer),
        ColumnDef::stored("post_id", SqlType::Integer),
        ColumnDef::stored("text", SqlType::Text),
        ColumnDef::stored("version", SqlType::Integer),
        ColumnDef::stored("created_at", SqlType::Timestamp),
        ColumnDef::stored("updated_at", SqlType::Timestamp),
    ],
};

impl Record for Comment {
    fn schema() -> &'static EntitySchema {
        &COMMENT_SCHEMA
    }

    fn from_fields(fields: &Fields<'_>) -> Result<Self, MappingError> {
        Ok(Comment {
            id: fields.i64("id")?,
            post_id: fields.i64("post_id")?,
            text: fields.text("text")?,
            version: fields.i64("version")?,
            created_at: fields.timestamp("created_at")?,
            updated_at: fields.timestamp("updated_at")?,
        })
    }
}

/// Input for creating a comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub post_id: PostId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentPatch {
    pub text: String,
    pub expected_version: Option<i64>,
}

/// Comment listing filter (oldest first)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommentFilter {
    pub post_id: Option<PostId>,
}

impl CommentFilter {
    pub fn for_post(post_id: PostId) -> Self {
        Self {
            post_id: Some(post_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{record_to_wire, row_to_record, wire_to_record, Row};

    #[test]
    fn test_comment_row_and_wire() {
        let row = Row::new()
            .with("id", 5_i64)
            .with("post_id", 9_i64)
            .with("text", "Nice post")
            .with("version", 2_i64)
            .with("created_at", "2024-02-01T12:00:00.000000Z")
            .with("updated_at", "2024-02-01T12:30:00.000000Z");

        let comment: Comment = row_to_record(&row).unwrap();
        assert_eq!(comment.post_id, 9);

        let wire = record_to_wire(&comment).unwrap();
        assert_eq!(wire["postId"], "9");
        assert_eq!(wire_to_record::<Comment>(&wire).unwrap(), comment);
    }

    #[test]
    fn test_comment_wire_rejects_unknown_fields() {
        let wire = serde_json::json!({
            "id": "1",
            "postId": "1",
            "text": "hi",
            "version": "1",
            "createdAt": "2024-02-01T12:00:00Z",
            "updatedAt": "2024-02-01T12:00:00Z",
            "author": "mallory"
        });
        assert!(matches!(
            wire_to_record::<Comment>(&wire),
            Err(MappingError::Wire(_))
        ));
    }
}
