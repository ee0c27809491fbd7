// Comment request payloads and validation

use serde::{Deserialize, Serialize};

use crate::domain::{CommentPatch, NewComment, PostId};
use crate::error::{AppError, Result};
use crate::mapper::wire::opt_int_string;

pub const MAX_COMMENT_CHARS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub text: String,
}

impl CreateCommentRequest {
    pub fn into_new_comment(self, post_id: PostId) -> Result<NewComment> {
        validate_text(&self.text)?;
        Ok(NewComment {
            post_id,
            text: self.text,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UpdateCommentRequest {
    pub text: String,
    #[serde(default, with = "opt_int_string")]
    pub version: Option<i64>,
}

impl UpdateCommentRequest {
    pub fn into_patch(self) -> Result<CommentPatch> {
        validate_text(&self.text)?;
        Ok(CommentPatch {
            text: self.text,
            expected_version: self.version,
        })
    }
}

fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("comment cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::Validation(format!(
            "comment too long (max {} characters)",
            MAX_COMMENT_CHARS
        )));
    }
    Ok(())
}
