use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    /// Clamped `(page, page_size)`; out-of-range sizes fall back to the default.
    pub fn normalized(&self) -> (u32, u32) {
        let page = self.page.filter(|p| *p >= 1).unwrap_or(1);
        let page_size = self
            .page_size
            .filter(|s| (1..=MAX_PAGE_SIZE).contains(s))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        (page, page_size)
    }

    pub fn offset(&self) -> u32 {
        let (page, page_size) = self.normalized();
        (page - 1) * page_size
    }

    /// PostgREST `limit`/`offset` pair.
    pub fn to_query(&self) -> String {
        let (_, page_size) = self.normalized();
        format!("limit={}&offset={}", page_size, self.offset())
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, query: &PageQuery) -> Self {
        let (page, page_size) = query.normalized();
        let total_pages = total.div_ceil(page_size as u64);
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}
