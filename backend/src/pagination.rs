use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub search: Option<String>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    pub fn offset(&self) -> i64 {
        // Saturates for absurd page numbers; Postgres then returns no rows
        (self.page() - 1).saturating_mul(self.per_page())
    }

    /// Trimmed search term, `None` when blank.
    pub fn search(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
}

impl PaginationMeta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        let pages = if total == 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };
        Self {
            page,
            per_page,
            total,
            pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_page_and_page_size() {
        let query = PageQuery {
            page: Some(0),
            per_page: Some(500),
            search: None,
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), MAX_PER_PAGE);
        assert_eq!(query.offset(), 0);

        let query = PageQuery {
            page: Some(3),
            per_page: None,
            search: None,
        };
        assert_eq!(query.offset(), 40);
    }

    #[test]
    fn huge_page_saturates_offset() {
        let query = PageQuery {
            page: Some(i64::MAX),
            per_page: Some(20),
            search: None,
        };
        assert_eq!(query.page(), i64::MAX);
        assert_eq!(query.offset(), i64::MAX);

        let query = PageQuery {
            page: Some(i64::MIN),
            ..Default::default()
        };
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn blank_search_is_ignored() {
        let query = PageQuery {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(query.search(), None);

        let query = PageQuery {
            search: Some(" physics ".into()),
            ..Default::default()
        };
        assert_eq!(query.search(), Some("physics"));
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(PaginationMeta::new(1, 20, 0).pages, 0);
        assert_eq!(PaginationMeta::new(1, 20, 20).pages, 1);
        assert_eq!(PaginationMeta::new(2, 20, 41).pages, 3);
    }
}
