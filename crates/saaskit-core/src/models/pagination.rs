use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Single-column case-insensitive substring search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSpec {
    pub column: String,
    pub term: String,
}

/// Single-column ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    pub column: String,
    pub ascending: bool,
}

/// Options for a paginated table query
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// 1-indexed; 0 is treated as 1
    pub page: u32,
    /// Minimum 1
    pub page_size: u32,
    pub filters: Map<String, Value>,
    pub search: Option<SearchSpec>,
    pub order_by: Option<OrderSpec>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: crate::constants::DEFAULT_PAGE_SIZE,
            filters: Map::new(),
            search: None,
            order_by: None,
        }
    }
}

impl QueryOptions {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(column.into(), value.into());
        self
    }

    pub fn with_search(mut self, column: impl Into<String>, term: impl Into<String>) -> Self {
        self.search = Some(SearchSpec {
            column: column.into(),
            term: term.into(),
        });
        self
    }

    pub fn with_order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order_by = Some(OrderSpec {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Page number with 0 clamped to 1
    pub fn effective_page(&self) -> u32 {
        self.page.max(1)
    }

    /// Page size with 0 clamped to 1
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.max(1)
    }

    /// Row offset of the requested page
    pub fn offset(&self) -> u64 {
        (self.effective_page() as u64 - 1) * self.effective_page_size() as u64
    }
}

/// One page of results with the total count of matching rows
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(data: Vec<T>, total: u64, page: u32, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        Self {
            data,
            total,
            page: page.max(1),
            page_size,
            total_pages: total.div_ceil(page_size as u64) as u32,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }
}
