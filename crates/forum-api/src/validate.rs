//! Field checks shared by the handlers. Failures map to 422.

use serde::Deserialize;

use crate::error::ApiError;

pub(crate) fn char_len(value: &str) -> usize {
    value.chars().count()
}

pub(crate) fn require_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let len = char_len(value);
    if len < min || len > max {
        return Err(ApiError::validation(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

pub(crate) fn optional_max_len(field: &str, value: Option<&str>, max: usize) -> Result<(), ApiError> {
    match value {
        Some(v) if char_len(v) > max => Err(ApiError::validation(format!(
            "{} must be at most {} characters",
            field, max
        ))),
        _ => Ok(()),
    }
}

pub(crate) const MAX_TAGS: usize = 10;

/// Trims tags and drops blanks. An empty result becomes `None`.
pub(crate) fn clean_tags(tags: Option<Vec<String>>) -> Result<Option<Vec<String>>, ApiError> {
    let Some(tags) = tags else {
        return Ok(None);
    };
    if tags.len() > MAX_TAGS {
        return Err(ApiError::validation(format!("At most {} tags are allowed", MAX_TAGS)));
    }
    let cleaned: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    Ok(if cleaned.is_empty() { None } else { Some(cleaned) })
}

/// Blank strings count as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Rows to skip before `page`. Saturates so an absurd page number reads
/// past the end instead of overflowing.
pub(crate) fn page_offset(page: i64, size: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(size)
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageQuery {
    pub(crate) fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Sizes outside `1..=max` fall back to `default`.
    pub(crate) fn size_or_default(&self, default: i64, max: i64) -> i64 {
        match self.page_size {
            Some(size) if (1..=max).contains(&size) => size,
            _ => default,
        }
    }

    pub(crate) fn offset(&self, size: i64) -> i64 {
        page_offset(self.page(), size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(require_len("title", "校園生活", 3, 200).is_ok());
        assert!(require_len("title", "ab", 3, 200).is_err());
        assert!(optional_max_len("summary", Some("短"), 1).is_ok());
        assert!(optional_max_len("summary", Some("ab"), 1).is_err());
        assert!(optional_max_len("summary", None, 1).is_ok());
    }

    #[test]
    fn tags_are_trimmed_and_emptied() {
        let tags = clean_tags(Some(vec![" rust ".into(), "".into(), "  ".into()])).unwrap();
        assert_eq!(tags, Some(vec!["rust".to_string()]));
        assert_eq!(clean_tags(Some(vec![" ".into()])).unwrap(), None);
        assert_eq!(clean_tags(None).unwrap(), None);
        assert!(clean_tags(Some(vec!["t".to_string(); 11])).is_err());
    }

    #[test]
    fn paging_falls_back_to_defaults() {
        let q = PageQuery {
            page: Some(0),
            page_size: Some(500),
        };
        assert_eq!(q.page(), 1);
        assert_eq!(q.size_or_default(10, 100), 10);

        let q = PageQuery {
            page: Some(3),
            page_size: Some(20),
        };
        assert_eq!(q.size_or_default(10, 100), 20);
        assert_eq!(q.offset(20), 40);
    }

    #[test]
    fn huge_page_saturates_offset() {
        let q = PageQuery {
            page: Some(i64::MAX),
            page_size: Some(100),
        };
        assert_eq!(q.offset(100), i64::MAX);
        assert_eq!(page_offset(i64::MAX, 10_000), i64::MAX);
        assert_eq!(page_offset(1, 10), 0);
        assert_eq!(page_offset(-5, 10), 0);
    }
}
