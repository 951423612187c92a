use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, FieldErrors};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page-number pagination as requested through `?page=&page_size=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn from_params(page: Option<u32>, page_size: Option<u32>) -> Result<Self, AppError> {
        let mut errors = FieldErrors::new();
        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);

        if page == 0 {
            errors.add("page", "page must be 1 or greater");
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            errors.add(
                "page_size",
                format!("page_size must be between 1 and {MAX_PAGE_SIZE}"),
            );
        }
        errors.into_result()?;

        Ok(Self { page, page_size })
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    /// Cuts the current page out of an already ordered, complete result set.
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let count = items.len() as i64;
        let results = items
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.page_size as usize)
            .collect();
        Page::new(count, *self, results)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub page: u32,
    pub page_size: u32,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(count: i64, pagination: Pagination, results: Vec<T>) -> Self {
        Self {
            count,
            page: pagination.page,
            page_size: pagination.page_size,
            results,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageParams {
    pub fn pagination(&self) -> Result<Pagination, AppError> {
        Pagination::from_params(self.page, self.page_size)
    }
}
