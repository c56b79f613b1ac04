//! Offset-based pagination.
//!
//! Page `n` of size `s` skips `(n - 1) * s` rows. The total page count comes
//! from a separate count query and is never less than one, so an empty result
//! still reports a single (empty) page. Requesting a page past the end is not
//! an error: the data query runs and returns no rows.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::executor::Row;

pub const DEFAULT_PAGE_SIZE: u64 = 250;
pub const DEFAULT_MAX_PAGE_SIZE: u64 = 10_000;

/// Bounds applied when coercing page parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

/// A validated page request. `page >= 1`, `page_size >= 1`, and the offset fits an `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Page {
    page: u64,
    page_size: u64,
}

impl Page {
    pub fn new(page: u64, page_size: u64, limits: &PageLimits) -> Result<Self> {
        if page == 0 {
            return Err(EngineError::InvalidPagination(
                "page must be at least 1".to_string(),
            ));
        }
        if page_size == 0 {
            return Err(EngineError::InvalidPagination(
                "pageSize must be at least 1".to_string(),
            ));
        }
        if page_size > limits.max_page_size {
            return Err(EngineError::InvalidPagination(format!(
                "pageSize {page_size} exceeds maximum {}",
                limits.max_page_size
            )));
        }
        (page - 1)
            .checked_mul(page_size)
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or_else(|| {
                EngineError::InvalidPagination(format!("page {page} is out of range"))
            })?;
        Ok(Self { page, page_size })
    }

    /// Coerce raw `page` / `pageSize` strings, applying defaults for absent values.
    pub fn parse(page: Option<&str>, page_size: Option<&str>, limits: &PageLimits) -> Result<Self> {
        let page = match page {
            Some(raw) => parse_positive("page", raw)?,
            None => 1,
        };
        let page_size = match page_size {
            Some(raw) => parse_positive("pageSize", raw)?,
            None => limits.default_page_size,
        };
        Self::new(page, page_size, limits)
    }

    pub fn number(&self) -> u64 {
        self.page
    }

    pub fn size(&self) -> u64 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }

    /// `max(1, ceil(total / page_size))`.
    pub fn total_pages(&self, total_rows: u64) -> u64 {
        total_rows.div_ceil(self.page_size).max(1)
    }
}

fn parse_positive(name: &str, raw: &str) -> Result<u64> {
    let trimmed = raw.trim();
    let value: i64 = trimmed.parse().map_err(|_| {
        EngineError::InvalidPagination(format!("{name} must be an integer, got `{trimmed}`"))
    })?;
    if value < 1 {
        return Err(EngineError::InvalidPagination(format!(
            "{name} must be at least 1, got {value}"
        )));
    }
    Ok(value as u64)
}

/// One page of rows plus the paging metadata returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResultPage {
    pub data: Vec<Row>,
    pub current_page: u64,
    pub total_pages: u64,
}

impl QueryResultPage {
    /// Assemble a page from the data rows and the count query's scalar.
    pub fn assemble(page: &Page, rows: Vec<Row>, total_rows: i64) -> Self {
        let total = u64::try_from(total_rows).unwrap_or(0);
        Self {
            data: rows,
            current_page: page.number(),
            total_pages: page.total_pages(total),
        }
    }
}
