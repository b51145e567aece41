//! Page windows with totals and navigation metadata.
//!
//! # Invariants
//! - `total` counts every row matching the filters, independent of the window.
//! - `items` is the window `[offset, offset + limit)` under the requested
//!   ordering plus the primary-key tiebreak.
//! - `last_page >= 1` and `1 <= current_page <= last_page`.

use crate::error::RepoResult;
use crate::model::entity::Entity;
use crate::model::query::PaginationParams;
use crate::repo::log_outcome;
use crate::repo::repository::Repository;
use crate::repo::sql::sql_int;
use rusqlite::Connection;
use serde::Serialize;
use std::time::Instant;

/// Navigation metadata for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
    pub current_page: u64,
    pub last_page: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PageMeta {
    /// Derives page numbers from a total and a window.
    ///
    /// A zero `limit` yields a single empty page.
    pub fn calculate(total: u64, limit: u64, offset: u64) -> Self {
        if limit == 0 {
            return Self {
                total,
                limit,
                offset,
                current_page: 1,
                last_page: 1,
                has_next: false,
                has_previous: offset > 0,
            };
        }

        let last_page = total.div_ceil(limit).max(1);
        let current_page = (offset / limit + 1).min(last_page);
        Self {
            total,
            limit,
            offset,
            current_page,
            last_page,
            has_next: offset.saturating_add(limit) < total,
            has_previous: offset > 0,
        }
    }
}

/// One window of items plus the metadata describing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn empty(meta: PageMeta) -> Self {
        Self {
            items: Vec::new(),
            meta,
        }
    }

    /// Converts every item, keeping the metadata.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }

    /// Fallible `map`; stops at the first error.
    pub fn try_map<U, Err, F>(self, f: F) -> Result<Page<U>, Err>
    where
        F: FnMut(T) -> Result<U, Err>,
    {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<Vec<_>, _>>()?,
            meta: self.meta,
        })
    }
}

impl<E: Entity> Repository<E> {
    /// Returns one page plus the total count of matching rows.
    ///
    /// Counts first; the window query is skipped when the page cannot hold
    /// any rows.
    pub fn paginate_params(
        &self,
        conn: &Connection,
        params: &PaginationParams<E>,
    ) -> RepoResult<Page<E>> {
        let started_at = Instant::now();
        let result = self.fetch_page(conn, params);
        log_outcome(
            E::NAME,
            "paginate",
            started_at,
            result.as_ref().map(|page| page.items.len()),
        );
        result
    }

    fn fetch_page(&self, conn: &Connection, params: &PaginationParams<E>) -> RepoResult<Page<E>> {
        let limit = sql_int("limit", params.limit())?;
        let offset = sql_int("offset", params.offset())?;

        let total = self.count_matching(conn, params.filters(), params.include_deleted())?;
        let meta = PageMeta::calculate(total, params.limit(), params.offset());
        if params.limit() == 0 || params.offset() >= total {
            return Ok(Page::empty(meta));
        }

        let items = self.select(
            conn,
            params.filters(),
            params.ordering(),
            Some(limit),
            offset,
            params.include_deleted(),
        )?;
        Ok(Page { items, meta })
    }
}

#[cfg(test)]
mod tests {
    use super::{Page, PageMeta};

    #[test]
    fn empty_result_is_a_single_page() {
        let meta = PageMeta::calculate(0, 20, 0);
        assert_eq!((meta.current_page, meta.last_page), (1, 1));
        assert!(!meta.has_next);
        assert!(!meta.has_previous);
    }

    #[test]
    fn partial_last_page_rounds_up() {
        let meta = PageMeta::calculate(5, 2, 2);
        assert_eq!((meta.current_page, meta.last_page), (2, 3));
        assert!(meta.has_next);
        assert!(meta.has_previous);
    }

    #[test]
    fn offset_past_the_end_clamps_to_last_page() {
        let meta = PageMeta::calculate(5, 2, 10);
        assert_eq!((meta.current_page, meta.last_page), (3, 3));
        assert!(!meta.has_next);
    }

    #[test]
    fn zero_limit_never_advances() {
        let meta = PageMeta::calculate(7, 0, 0);
        assert_eq!((meta.current_page, meta.last_page), (1, 1));
        assert!(!meta.has_next);
    }

    #[test]
    fn unaligned_offset_reports_containing_page() {
        let meta = PageMeta::calculate(10, 4, 5);
        assert_eq!((meta.current_page, meta.last_page), (2, 3));
    }

    #[test]
    fn map_keeps_metadata() {
        let page = Page {
            items: vec![1, 2],
            meta: PageMeta::calculate(2, 20, 0),
        };
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!(mapped.meta.total, 2);
    }
}
