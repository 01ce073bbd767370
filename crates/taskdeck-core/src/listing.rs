//! Paginated, filterable, sortable listing over the record store.
//!
//! Raw query parameters are turned into a validated [`ListQuery`] before the
//! store is touched. [`list`] then runs three counts and one page query and
//! assembles pagination metadata and statistics.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ListingConfig;
use crate::error::Result;
use crate::store::TodoStore;
use crate::types::{SortField, SortOrder, SortSpec, Todo, TodoFilter};

pub const DEFAULT_PAGE: u64 = 1;

/// Query string of the listing endpoint, as received.
///
/// `page` and `limit` stay textual so malformed values can be coerced to
/// defaults instead of failing extraction.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub search: Option<String>,
}

/// Validated listing plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u64,
    pub limit: u64,
    pub sort: SortSpec,
    pub search: Option<String>,
}

impl ListQuery {
    /// Validate raw parameters.
    ///
    /// Unknown `sortBy`/`sortOrder` values are rejected. Zero, negative or
    /// unparsable `page`/`limit` fall back to their defaults, and `limit` is
    /// capped at `config.max_limit`.
    pub fn parse(params: &ListParams, config: &ListingConfig) -> Result<Self> {
        let field = match non_blank(params.sort_by.as_deref()) {
            Some(raw) => raw.parse::<SortField>()?,
            None => SortField::default(),
        };
        let order = match non_blank(params.sort_order.as_deref()) {
            Some(raw) => raw.parse::<SortOrder>()?,
            None => SortOrder::default(),
        };

        let page = positive_or(params.page.as_deref(), DEFAULT_PAGE);
        let limit = positive_or(params.limit.as_deref(), config.default_limit.max(1))
            .min(config.max_limit.max(1));

        let search = non_blank(params.search.as_deref()).map(str::to_string);

        Ok(Self {
            page,
            limit,
            sort: SortSpec { field, order },
            search,
        })
    }

    pub fn filter(&self) -> TodoFilter {
        TodoFilter {
            search: self.search.clone(),
            completed: None,
        }
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn positive_or(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .map(|n| n as u64)
        .unwrap_or(default)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_count: u64,
    pub limit: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub next_page: Option<u64>,
    pub prev_page: Option<u64>,
}

impl Pagination {
    /// Compute page metadata, clamping `requested` into `[1, max(1, total_pages)]`.
    pub fn compute(requested: u64, limit: u64, total_count: u64) -> Self {
        let limit = limit.max(1);
        let total_pages = total_count.div_ceil(limit);
        let current_page = requested.clamp(1, total_pages.max(1));
        let has_next_page = current_page < total_pages;
        let has_prev_page = total_pages > 0 && current_page > 1;

        Self {
            current_page,
            total_pages,
            total_count,
            limit,
            has_next_page,
            has_prev_page,
            next_page: has_next_page.then(|| current_page + 1),
            prev_page: has_prev_page.then(|| current_page - 1),
        }
    }

    /// Number of records to skip to reach `current_page`.
    pub fn offset(&self) -> u64 {
        (self.current_page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total: u64,
    pub completed: u64,
    pub uncompleted: u64,
    pub current_page_count: u64,
}

/// Listing result returned by `GET /api/todos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPage {
    pub data: Vec<Todo>,
    pub pagination: Pagination,
    pub statistics: Statistics,
}

/// Execute a validated listing plan against `store`.
///
/// Read-only. Counts are taken over the filtered set, so `totalPages`
/// reflects the search, not the whole collection.
pub fn list<S>(store: &S, query: &ListQuery) -> Result<ListingPage>
where
    S: TodoStore + ?Sized,
{
    let filter = query.filter();

    let total = store.count(&filter)?;
    let completed = store.count(&filter.with_completed(true))?;
    let uncompleted = store.count(&filter.with_completed(false))?;

    let pagination = Pagination::compute(query.page, query.limit, total);
    let data = if total == 0 {
        Vec::new()
    } else {
        store.find_page(&filter, query.sort, pagination.offset(), pagination.limit)?
    };

    debug!(
        page = pagination.current_page,
        limit = pagination.limit,
        sort_by = %query.sort.field,
        sort_order = %query.sort.order,
        search = query.search.as_deref().unwrap_or(""),
        total,
        returned = data.len(),
        "Listing executed"
    );

    let statistics = Statistics {
        total,
        completed,
        uncompleted,
        current_page_count: data.len() as u64,
    };

    Ok(ListingPage {
        data,
        pagination,
        statistics,
    })
}
