use serde::Serialize;

use crate::error::{Result, TableError};

pub const DEFAULT_PAGE_SIZE: usize = 6;

/// Current page (1-based) over a fixed page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    current_page: usize,
    page_size: usize,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            current_page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageState {
    pub fn new(page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(TableError::ZeroPageSize);
        }
        Ok(Self {
            current_page: 1,
            page_size,
        })
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Never below one: an empty set still shows page 1 of 1.
    pub fn total_pages(&self, record_count: usize) -> usize {
        record_count.div_ceil(self.page_size).max(1)
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    pub fn clamp(&mut self, record_count: usize) {
        self.current_page = self.current_page.clamp(1, self.total_pages(record_count));
    }

    pub fn go_to(&mut self, page: usize, record_count: usize) {
        self.current_page = page;
        self.clamp(record_count);
    }

    /// Returns false when already on the last page.
    pub fn next(&mut self, record_count: usize) -> bool {
        if self.current_page >= self.total_pages(record_count) {
            return false;
        }
        self.current_page += 1;
        true
    }

    /// Returns false when already on the first page.
    pub fn previous(&mut self) -> bool {
        if self.current_page <= 1 {
            return false;
        }
        self.current_page -= 1;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub records: Vec<T>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_records: usize,
}

impl<T> Page<T> {
    pub fn label(&self) -> String {
        format!("Page {} of {}", self.current_page, self.total_pages)
    }
}

pub fn paginate<T: Clone>(records: &[T], state: &PageState) -> Page<T> {
    let total_pages = state.total_pages(records.len());
    let current_page = state.current_page.clamp(1, total_pages);
    let start = (current_page - 1) * state.page_size;
    let end = std::cmp::min(start + state.page_size, records.len());
    let slice = if start >= records.len() {
        Vec::new()
    } else {
        records[start..end].to_vec()
    };

    Page {
        records: slice,
        current_page,
        total_pages,
        total_records: records.len(),
    }
}
