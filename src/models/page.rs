//! Pagination

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::loan::LoanView,
};

/// A validated 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: i64,
    pub size: i64,
}

impl PageRequest {
    /// Apply defaults and bounds from configuration
    pub fn resolve(number: Option<i64>, size: Option<i64>, config: &LoansConfig) -> AppResult<Self> {
        let number = number.unwrap_or(1);
        let size = size.unwrap_or(config.default_page_size);

        if number < 1 {
            return Err(AppError::Validation("page_number must be at least 1".to_string()));
        }
        if size < 1 || size > config.max_page_size {
            return Err(AppError::Validation(format!(
                "page_size must be between 1 and {}",
                config.max_page_size
            )));
        }
        // offset() must stay representable
        if (number - 1).checked_mul(size).is_none() {
            return Err(AppError::Validation(format!("page_number {} is out of range", number)));
        }
        Ok(Self { number, size })
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.size
    }
}

/// One page of results plus navigation metadata
#[derive(Debug, Clone, Serialize, ToSchema)]
#[aliases(LoanPage = Page<LoanView>)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub page_number: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: i64, request: PageRequest) -> Self {
        // ceil(total / size)
        let total_pages = (total_count + request.size - 1) / request.size;
        Self {
            items,
            total_count,
            page_number: request.number,
            page_size: request.size,
            total_pages,
            has_previous: request.number > 1,
            has_next: request.number < total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page_number: self.page_number,
            page_size: self.page_size,
            total_pages: self.total_pages,
            has_previous: self.has_previous,
            has_next: self.has_next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(number: i64, size: i64) -> PageRequest {
        PageRequest::resolve(Some(number), Some(size), &LoansConfig::default()).unwrap()
    }

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(Page::new(Vec::<()>::new(), 0, request(1, 20)).total_pages, 0);
        assert_eq!(Page::new(Vec::<()>::new(), 20, request(1, 20)).total_pages, 1);
        assert_eq!(Page::new(Vec::<()>::new(), 21, request(1, 20)).total_pages, 2);
        assert_eq!(Page::new(Vec::<()>::new(), 7, request(1, 3)).total_pages, 3);
    }

    #[test]
    fn test_navigation_flags() {
        let first = Page::new(Vec::<()>::new(), 7, request(1, 3));
        assert!(!first.has_previous && first.has_next);
        let middle = Page::new(Vec::<()>::new(), 7, request(2, 3));
        assert!(middle.has_previous && middle.has_next);
        let last = Page::new(Vec::<()>::new(), 7, request(3, 3));
        assert!(last.has_previous && !last.has_next);
        let empty = Page::new(Vec::<()>::new(), 0, request(1, 3));
        assert!(!empty.has_previous && !empty.has_next);
    }

    #[test]
    fn test_defaults_and_bounds() {
        let config = LoansConfig::default();
        let defaulted = PageRequest::resolve(None, None, &config).unwrap();
        assert_eq!(defaulted, PageRequest { number: 1, size: 20 });
        assert_eq!(request(3, 10).offset(), 20);

        assert!(PageRequest::resolve(Some(0), None, &config).is_err());
        assert!(PageRequest::resolve(None, Some(0), &config).is_err());
        assert!(PageRequest::resolve(None, Some(config.max_page_size + 1), &config).is_err());
    }

    #[test]
    fn test_huge_page_number_is_rejected() {
        let config = LoansConfig::default();
        let err = PageRequest::resolve(Some(i64::MAX), Some(20), &config).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Single-item pages never overflow
        let last = PageRequest::resolve(Some(i64::MAX), Some(1), &config).unwrap();
        assert_eq!(last.offset(), i64::MAX - 1);
    }
}
