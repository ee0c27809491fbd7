// Pagination

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::mapper::wire::int_string;

/// 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Pagination {
    pub page_number: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub const DEFAULT_PAGE_SIZE: u32 = 25;
    pub const MAX_PAGE_SIZE: u32 = 500;

    pub fn new(page_number: u32, page_size: u32) -> Result<Self> {
        let pagination = Self {
            page_number,
            page_size,
        };
        pagination.validate()?;
        Ok(pagination)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_number == 0 {
            return Err(AppError::Validation(
                "pageNumber starts at 1".to_string(),
            ));
        }
        if self.page_size == 0 || self.page_size > Self::MAX_PAGE_SIZE {
            return Err(AppError::Validation(format!(
                "pageSize must be between 1 and {}",
                Self::MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page_number.saturating_sub(1)) * i64::from(self.page_size)
    }

    pub fn next(&self) -> Self {
        Self {
            page_number: self.page_number.saturating_add(1),
            ..*self
        }
    }
}

/// One page of results plus navigation metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: u32,
    pub page_size: u32,
    #[serde(with = "int_string")]
    pub total_count: i64,
    pub last_page: u32,
    pub has_prev: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, pagination: Pagination, total_count: i64) -> Self {
        let size = i64::from(pagination.page_size.max(1));
        let pages = (total_count.max(0) + size - 1) / size;
        let last_page = u32::try_from(pages.max(1)).unwrap_or(u32::MAX);

        Self {
            items,
            page_number: pagination.page_number,
            page_size: pagination.page_size,
            total_count,
            last_page,
            has_prev: pagination.page_number > 1,
            has_next: pagination.page_number < last_page,
        }
    }

    pub fn empty(pagination: Pagination) -> Self {
        Self::new(Vec::new(), pagination, 0)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page_number: self.page_number,
            page_size: self.page_size,
            total_count: self.total_count,
            last_page: self.last_page,
            has_prev: self.has_prev,
            has_next: self.has_next,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
