//! Offset pagination over a counted table
//!
//! Pages are 1-based. A page is addressable only when it lies within
//! `[1, ceil(total_count / rows_per_page)]`, so an empty table has no
//! addressable page at all.

use serde::Serialize;

use crate::schema::RowRange;
use crate::Error;

/// Rows per page used when nothing else is configured
pub const DEFAULT_ROWS_PER_PAGE: u64 = 10;

/// Pagination cursor plus the total row count reported by the last fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    pub current_page: u64,
    pub rows_per_page: u64,
    pub total_count: u64,
}

impl Default for PageState {
    fn default() -> Self {
        Self::new(DEFAULT_ROWS_PER_PAGE)
    }
}

impl PageState {
    /// First page of a table whose size is not known yet
    pub fn new(rows_per_page: u64) -> Self {
        Self {
            current_page: 1,
            rows_per_page,
            total_count: 0,
        }
    }

    /// Check the cursor before any request is built from it
    pub fn validate(&self) -> Result<(), Error> {
        if self.current_page < 1 || self.rows_per_page < 1 {
            return Err(Error::Validation(format!(
                "invalid page {} or rows per page {}",
                self.current_page, self.rows_per_page
            )));
        }
        Ok(())
    }

    /// Number of addressable pages, `ceil(total_count / rows_per_page)`
    pub fn page_count(&self) -> u64 {
        if self.rows_per_page == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.rows_per_page)
    }

    /// Row range of the current page
    pub fn range(&self) -> RowRange {
        RowRange {
            offset: self.current_page.saturating_sub(1) * self.rows_per_page,
            limit: self.rows_per_page,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page * self.rows_per_page < self.total_count
    }

    /// Validate a page change against the last known row count
    ///
    /// Leaves `self` untouched; the caller applies the returned page.
    pub fn check_page(&self, page: u64) -> Result<u64, Error> {
        let page_count = self.page_count();
        if page < 1 || page > page_count {
            return Err(Error::Validation(format!(
                "page {} is outside 1..={}",
                page, page_count
            )));
        }
        Ok(page)
    }
}

/// What the pagination controls can offer for the current grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "state")]
pub enum PaginationControl {
    NoTableSelected,
    SinglePage,
    HasPages { page_count: u64 },
}

impl PaginationControl {
    /// Recompute the control state after a selection or count change
    pub fn compute(table_selected: bool, page: &PageState) -> Self {
        if !table_selected {
            return Self::NoTableSelected;
        }
        match page.page_count() {
            0 | 1 => Self::SinglePage,
            page_count => Self::HasPages { page_count },
        }
    }

    /// Navigation buttons are shown only when more than one page exists
    pub fn shows_navigation(&self) -> bool {
        matches!(self, Self::HasPages { .. })
    }
}
