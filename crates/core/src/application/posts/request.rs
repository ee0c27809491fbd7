// Post request payloads and validation

use serde::{Deserialize, Serialize};

use crate::domain::{normalize_tags, NewPost, Pagination, PostFilter, PostOrder, PostPatch};
use crate::error::{AppError, Result};
use crate::mapper::wire::opt_int_string;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_TEXT_CHARS: usize = 100_000;
pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ListPostsRequest {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub order: PostOrder,
    #[serde(default = "default_page_number")]
    pub page_number: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ListPostsRequest {
    fn default() -> Self {
        Self {
            search: None,
            order: PostOrder::default(),
            page_number: default_page_number(),
            page_size: default_page_size(),
        }
    }
}

fn default_page_number() -> u32 {
    1
}

fn default_page_size() -> u32 {
    Pagination::DEFAULT_PAGE_SIZE
}

impl ListPostsRequest {
    pub fn into_query(self) -> Result<(PostFilter, Pagination)> {
        let pagination = Pagination::new(self.page_number, self.page_size)?;
        let filter = self
            .search
            .as_deref()
            .map(PostFilter::parse)
            .unwrap_or_default()
            .ordered_by(self.order);
        Ok((filter, pagination))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreatePostRequest {
    pub fn into_new_post(self) -> Result<NewPost> {
        let title = validate_title(&self.title)?;
        validate_text(&self.text)?;
        let tags = validate_tags(&self.tags)?;
        Ok(NewPost {
            title,
            text: self.text,
            tags,
        })
    }
}

/// Full replacement; `version` enables the optimistic check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, with = "opt_int_string")]
    pub version: Option<i64>,
}

impl UpdatePostRequest {
    pub fn into_patch(self) -> Result<PostPatch> {
        let title = validate_title(&self.title)?;
        validate_text(&self.text)?;
        let tags = validate_tags(&self.tags)?;
        Ok(PostPatch {
            title,
            text: self.text,
            tags,
            expected_version: self.version,
        })
    }
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("title cannot be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::Validation(format!(
            "title too long (max {} characters)",
            MAX_TITLE_CHARS
        )));
    }
    Ok(title.to_string())
}

fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("text cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(AppError::Validation(format!(
            "text too long (max {} characters)",
            MAX_TEXT_CHARS
        )));
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<Vec<String>> {
    let tags = normalize_tags(tags);
    if tags.len() > MAX_TAGS {
        return Err(AppError::Validation(format!(
            "too many tags (max {})",
            MAX_TAGS
        )));
    }
    if let Some(tag) = tags.iter().find(|t| t.chars().count() > MAX_TAG_CHARS) {
        return Err(AppError::Validation(format!("tag too long: {}", tag)));
    }
    if let Some(tag) = tags.iter().find(|t| t.chars().any(char::is_whitespace)) {
        return Err(AppError::Validation(format!(
            "tag cannot contain whitespace: {}",
            tag
        )));
    }
    Ok(tags)
}
