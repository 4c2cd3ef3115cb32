//! Result pages
//!
//! Every backend funnels its hit count through [`PageWindow::resolve`] so the
//! page arithmetic (blank page, fallback to page 1, `ALL_RESULTS`) is the same
//! everywhere.

use crate::domain::models::Product;
use crate::error::{CatalogError, Result};

/// Page number requesting the complete, unsliced result set
pub const ALL_RESULTS: i64 = -1;

/// One page of products
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPage {
    /// 1-based; 0 only on the blank page
    pub page_num: usize,
    pub total_pages: usize,
    pub page_size: usize,
    pub num_of_hits: usize,
    pub products: Vec<Product>,
}

impl ProductPage {
    /// Zero-hit result: page 0 of 0
    pub fn blank(page_size: usize) -> Self {
        Self {
            page_num: 0,
            total_pages: 0,
            page_size,
            num_of_hits: 0,
            products: Vec::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.total_pages == 0
    }

    pub fn is_last_page(&self) -> bool {
        self.page_num >= self.total_pages
    }

    pub fn is_first_page(&self) -> bool {
        self.page_num <= 1
    }

    /// ceil(hits / page_size)
    pub fn total_pages_for(num_of_hits: usize, page_size: usize) -> usize {
        if page_size == 0 {
            return 0;
        }
        num_of_hits.div_ceil(page_size)
    }
}

/// Which slice of a result set a page request maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageWindow {
    /// No hits
    Blank,
    /// `ALL_RESULTS`: everything, no slicing
    All,
    /// Rows `[offset, offset + page_size)` of the ordered result
    Slice { page_num: usize, offset: usize },
}

impl PageWindow {
    /// Map a requested page onto a result of `num_of_hits` rows
    ///
    /// A page whose first row lies past the end falls back to page 1.
    ///
    /// # Errors
    /// `QueryFormulation` for page numbers below 1 other than `ALL_RESULTS`,
    /// or a zero page size.
    pub fn resolve(page_num: i64, page_size: usize, num_of_hits: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(CatalogError::query_formulation("page size must be positive"));
        }
        if page_num != ALL_RESULTS && page_num < 1 {
            return Err(CatalogError::query_formulation(format!(
                "invalid page number {}",
                page_num
            )));
        }
        if num_of_hits == 0 {
            return Ok(PageWindow::Blank);
        }
        if page_num == ALL_RESULTS {
            return Ok(PageWindow::All);
        }

        let requested = page_num as usize;
        let offset = (requested - 1).saturating_mul(page_size);
        if offset >= num_of_hits {
            tracing::debug!(
                requested,
                num_of_hits,
                "page past end of results, falling back to page 1"
            );
            return Ok(PageWindow::Slice {
                page_num: 1,
                offset: 0,
            });
        }
        Ok(PageWindow::Slice {
            page_num: requested,
            offset,
        })
    }

    /// Build the page for this window from the already-sliced products
    pub fn into_page(self, page_size: usize, num_of_hits: usize, products: Vec<Product>) -> ProductPage {
        match self {
            PageWindow::Blank => ProductPage::blank(page_size),
            PageWindow::All => ProductPage {
                page_num: 1,
                total_pages: 1,
                page_size: num_of_hits,
                num_of_hits,
                products,
            },
            PageWindow::Slice { page_num, .. } => ProductPage {
                page_num,
                total_pages: ProductPage::total_pages_for(num_of_hits, page_size),
                page_size,
                num_of_hits,
                products,
            },
        }
    }

    /// Slice bounds into a fully materialized result
    pub fn bounds(&self, page_size: usize, num_of_hits: usize) -> (usize, usize) {
        match *self {
            PageWindow::Blank => (0, 0),
            PageWindow::All => (0, num_of_hits),
            PageWindow::Slice { offset, .. } => {
                (offset, offset.saturating_add(page_size).min(num_of_hits))
            }
        }
    }
}
