//! Zero-based page cursors and filter-aware list state.

use abono_core::Page;

/// Position within a server-paginated list.
///
/// The server's `last` flag decides whether "next" is available. Until a
/// page has been observed the cursor assumes there is nothing after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    page: u32,
    size: u32,
    total_pages: Option<u32>,
    is_last: bool,
}

impl PageCursor {
    pub fn new(size: u32) -> Self {
        Self {
            page: 0,
            size: size.max(1),
            total_pages: None,
            is_last: true,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Total page count from the last observed page; at least 1.
    pub fn total_pages(&self) -> u32 {
        self.total_pages.unwrap_or(1).max(1)
    }

    pub fn has_next(&self) -> bool {
        !self.is_last
    }

    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    /// Advance one page. Returns whether the cursor moved.
    pub fn next(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.page += 1;
        // Unknown until the new page arrives.
        self.is_last = true;
        true
    }

    /// Step back one page, saturating at 0. Returns whether the cursor moved.
    pub fn prev(&mut self) -> bool {
        if self.page == 0 {
            return false;
        }
        self.page -= 1;
        self.is_last = false;
        true
    }

    pub fn reset(&mut self) {
        self.page = 0;
        self.total_pages = None;
        self.is_last = true;
    }

    /// Record the envelope returned for the current page.
    pub fn observe<T>(&mut self, page: &Page<T>) {
        self.total_pages = Some(page.total_pages);
        self.is_last = page.is_last;
    }
}

/// A filter plus the cursor it paginates. Changing the filter sends the
/// cursor back to page 0.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedList<F> {
    filter: F,
    cursor: PageCursor,
}

impl<F: PartialEq> PagedList<F> {
    pub fn new(filter: F, size: u32) -> Self {
        Self {
            filter,
            cursor: PageCursor::new(size),
        }
    }

    pub fn filter(&self) -> &F {
        &self.filter
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut PageCursor {
        &mut self.cursor
    }

    /// Replace the filter. Returns `true` (and resets the page) only when it
    /// actually changed.
    pub fn set_filter(&mut self, filter: F) -> bool {
        if self.filter == filter {
            return false;
        }
        self.filter = filter;
        self.cursor.reset();
        true
    }
}
