//! `page` / `perPage` translation used by every list operation.

use serde::Serialize;
use utoipa::ToSchema;

/// What a list request asks the storage layer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    /// `perPage > 0`: one window plus a total count.
    Window { skip: u64, take: u64 },
    /// `perPage <= 0` on page 1: every matching row.
    Everything,
    /// `perPage <= 0` on any other page: no rows, only the total.
    CountOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    per_page: i64,
}

impl PageRequest {
    /// `page` below 1 is clamped to 1. Any `per_page <= 0` disables pagination.
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page,
        }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
    }

    pub fn mode(&self) -> PageMode {
        if self.per_page > 0 {
            let take = self.per_page as u64;
            let skip = (self.page as u64 - 1).saturating_mul(take);
            PageMode::Window { skip, take }
        } else if self.page == 1 {
            PageMode::Everything
        } else {
            PageMode::CountOnly
        }
    }

    /// Builds the result envelope. In unpaginated modes the reported
    /// `perPage` is the total, i.e. "one page holding everything".
    pub fn into_result<T>(self, items: Vec<T>, total: u64) -> Pagination<T> {
        let per_page = match self.mode() {
            PageMode::Window { .. } => self.per_page,
            PageMode::Everything | PageMode::CountOnly => total as i64,
        };
        Pagination {
            items,
            pagination: PaginationMeta {
                page: self.page,
                per_page,
                total,
            },
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: i64,
    pub per_page: i64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination<T> {
    pub items: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> Pagination<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Pagination<U> {
        Pagination {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paged_mode_computes_offset() {
        assert_eq!(
            PageRequest::new(2, 10).mode(),
            PageMode::Window { skip: 10, take: 10 }
        );
        assert_eq!(
            PageRequest::new(3, 10).mode(),
            PageMode::Window { skip: 20, take: 10 }
        );
    }

    #[test]
    fn page_below_one_is_clamped() {
        for page in [0, -5, i64::MIN] {
            let req = PageRequest::new(page, 10);
            assert_eq!(req.page(), 1);
            assert_eq!(req.mode(), PageMode::Window { skip: 0, take: 10 });
        }
    }

    #[test]
    fn zero_or_negative_per_page_is_unpaginated() {
        assert_eq!(PageRequest::new(1, 0).mode(), PageMode::Everything);
        assert_eq!(PageRequest::new(1, -3).mode(), PageMode::Everything);
        assert_eq!(PageRequest::new(0, 0).mode(), PageMode::Everything);
        assert_eq!(PageRequest::new(2, 0).mode(), PageMode::CountOnly);
        assert_eq!(PageRequest::new(7, -1).mode(), PageMode::CountOnly);
    }

    #[test]
    fn unpaginated_reports_total_as_per_page() {
        let everything = PageRequest::new(1, 0).into_result(vec![1, 2, 3], 3);
        assert_eq!(everything.pagination.per_page, 3);
        assert_eq!(everything.pagination.total, 3);

        let count_only = PageRequest::new(2, 0).into_result(Vec::<i32>::new(), 25);
        assert!(count_only.items.is_empty());
        assert_eq!(count_only.pagination.per_page, 25);
        assert_eq!(count_only.pagination.page, 2);
    }

    #[test]
    fn paged_result_keeps_requested_per_page() {
        let r = PageRequest::new(3, 10).into_result(vec![0; 5], 25);
        assert_eq!(r.pagination.per_page, 10);
        assert_eq!(r.pagination.page, 3);
        assert_eq!(r.items.len(), 5);
    }

    #[test]
    fn serializes_camel_case_meta() {
        let r = PageRequest::new(1, 2).into_result(vec!["a"], 1);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["pagination"]["perPage"], 2);
        assert_eq!(v["pagination"]["total"], 1);
        assert_eq!(v["items"][0], "a");
    }
}
