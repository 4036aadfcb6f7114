use serde::Deserialize;
use thiserror::Error;
use utoipa::IntoParams;

/// Offset sentinel that sorts before every valid ID ('-' < '0').
pub const OFFSET_MIN: &str = "-";
/// Offset sentinel that sorts after every valid ID ('|' > 'z').
pub const OFFSET_MAX: &str = "|";

/// PageError
///
/// Returned when a pagination query parameter is present but unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("invalid parameter, reverse: {0}")]
    InvalidReverse(String),
    #[error("invalid parameter, limit: {0}")]
    InvalidLimit(String),
}

/// PageQuery
///
/// Raw pagination parameters, exactly as they appear on the query string.
/// Parsing is deferred to `PageRequest::parse` so that bad values become
/// descriptive 400 responses instead of generic extractor rejections.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Scan in descending ID order.
    pub reverse: Option<String>,
    /// Maximum number of items to return (>= 1).
    pub limit: Option<String>,
    /// Exclusive cursor: the last ID of the previous page.
    pub offset: Option<String>,
}

/// PageRequest
///
/// A normalized cursor page. The first page is selected naturally by comparing
/// IDs against the offset: strictly greater when ascending, strictly less when
/// descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub reverse: bool,
    pub limit: usize,
    pub offset: String,
}

impl PageRequest {
    /// parse
    ///
    /// Normalizes raw query parameters against per-endpoint defaults.
    /// A missing or empty offset becomes the sentinel for the scan direction.
    pub fn parse(
        query: &PageQuery,
        default_reverse: bool,
        default_limit: usize,
    ) -> Result<Self, PageError> {
        let reverse = match non_empty(&query.reverse) {
            Some(raw) => parse_bool(raw).ok_or_else(|| PageError::InvalidReverse(raw.to_string()))?,
            None => default_reverse,
        };

        let limit = match non_empty(&query.limit) {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|limit| *limit >= 1)
                .ok_or_else(|| PageError::InvalidLimit(raw.to_string()))?,
            None => default_limit,
        };

        Ok(Self::new(reverse, limit, non_empty(&query.offset).map(str::to_string)))
    }

    pub fn new(reverse: bool, limit: usize, offset: Option<String>) -> Self {
        let offset = offset.unwrap_or_else(|| Self::sentinel(reverse).to_string());
        Self { reverse, limit, offset }
    }

    /// A page that covers the whole key space in ascending order.
    pub fn unbounded() -> Self {
        Self::new(false, usize::MAX, None)
    }

    pub fn sentinel(reverse: bool) -> &'static str {
        if reverse { OFFSET_MAX } else { OFFSET_MIN }
    }

    /// Returns true if `id` falls on the far side of the cursor for this scan direction.
    pub fn admits(&self, id: &str) -> bool {
        if self.reverse {
            id < self.offset.as_str()
        } else {
            id > self.offset.as_str()
        }
    }

    /// select
    ///
    /// Applies the page to IDs that are already sorted ascending.
    pub fn select<'a, I>(&self, sorted_ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
        I::IntoIter: DoubleEndedIterator,
    {
        let ids = sorted_ids.into_iter();
        if self.reverse {
            ids.rev()
                .filter(|id| self.admits(id))
                .take(self.limit)
                .cloned()
                .collect()
        } else {
            ids.filter(|id| self.admits(id))
                .take(self.limit)
                .cloned()
                .collect()
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Accepts the same spellings as the classic `ParseBool` family of parsers.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
