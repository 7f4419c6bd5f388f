//! Pagination requests and page responses.
//!
//! A [`Pagination`] is what an HTTP layer parses out of query parameters
//! (`page`, `size`, `search=field:value`, `sort=field:ASC`). The statement
//! constructor turns it into [`FindOptions`](crate::query::FindOptions);
//! [`Page`] wraps the result.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;
use crate::error::{FastgearError, Result};
use crate::query::Order;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationSort {
    pub field: String,
    pub by: Order,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTerm {
    pub field: String,
    pub value: String,
}

/// A search entry: one term, or a group of terms any of which may match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaginationSearch {
    Single(SearchTerm),
    Group(Vec<SearchTerm>),
}

impl PaginationSearch {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        PaginationSearch::Single(SearchTerm {
            field: field.into(),
            value: value.into(),
        })
    }
}

/// A page request.
///
/// `skip` is the 1-based page number; it is converted to a row offset only
/// when the request becomes a `FindOptions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub skip: u64,
    pub take: u64,
    #[serde(default)]
    pub sort: Vec<PaginationSort>,
    #[serde(default)]
    pub search: Vec<PaginationSearch>,
    #[serde(default)]
    pub columns: Vec<String>,
    /// Matched against every column, OR-combined.
    #[serde(default)]
    pub search_all: Option<String>,
}

impl Pagination {
    pub fn new(page: u64, size: u64) -> Self {
        Self {
            skip: page,
            take: size,
            sort: Vec::new(),
            search: Vec::new(),
            columns: Vec::new(),
            search_all: None,
        }
    }

    pub fn sort(mut self, field: impl Into<String>, by: Order) -> Self {
        self.sort.push(PaginationSort {
            field: field.into(),
            by,
        });
        self
    }

    pub fn search(mut self, search: PaginationSearch) -> Self {
        self.search.push(search);
        self
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(name.into());
        self
    }

    pub fn search_all(mut self, needle: impl Into<String>) -> Self {
        self.search_all = Some(needle.into());
        self
    }

    /// Row offset of the requested page. Page 0 is read as page 1.
    pub fn offset(&self) -> u64 {
        self.skip.max(1).saturating_sub(1).saturating_mul(self.take)
    }
}

/// One page of results with its position in the whole set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub size: u64,
    pub total: u64,
    pub pages: u64,
}

impl<T> Page<T> {
    /// Builds a page from a row offset. A zero `size` yields zero pages.
    pub fn from_offset(items: Vec<T>, total: u64, offset: u64, size: u64) -> Self {
        let (page, pages) = if size == 0 {
            (1, 0)
        } else {
            (offset / size + 1, total.div_ceil(size))
        };
        Page {
            items,
            page,
            size,
            total,
            pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total: self.total,
            pages: self.pages,
        }
    }
}

fn dedup(params: &[String]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::with_capacity(params.len());
    for param in params {
        if !seen.contains(&param.as_str()) {
            seen.push(param);
        }
    }
    seen
}

fn split_pair<'a>(param: &'a str, what: &str) -> Result<(&'a str, &'a str)> {
    let (field, value) = param.split_once(':').ok_or_else(|| {
        FastgearError::InvalidPagination(format!("{what} \"{param}\" must look like field:value"))
    })?;
    if !IDENTIFIER.is_match(field) {
        return Err(FastgearError::InvalidPagination(format!(
            "invalid {what} field \"{field}\""
        )));
    }
    Ok((field, value))
}

/// Parses query-string style paging parameters.
///
/// Duplicate `search`/`sort` entries are dropped, sort directions must be
/// `ASC` or `DESC`, and `size` must be between 1 and `max_take`.
///
/// ```
/// use fastgear::config::PaginationConfig;
/// use fastgear::pagination::build_pagination_options;
///
/// let p = build_pagination_options(
///     2,
///     10,
///     &["name:ada".to_string(), "name:ada".to_string()],
///     &["id:DESC".to_string()],
///     &PaginationConfig::default(),
/// )
/// .unwrap();
/// assert_eq!(p.search.len(), 1);
/// assert_eq!(p.offset(), 10);
/// ```
pub fn build_pagination_options(
    page: u64,
    size: u64,
    search: &[String],
    sort: &[String],
    config: &PaginationConfig,
) -> Result<Pagination> {
    if page == 0 {
        return Err(FastgearError::InvalidPagination(
            "page must be at least 1".into(),
        ));
    }
    if size == 0 || size > config.max_take {
        return Err(FastgearError::InvalidPagination(format!(
            "size must be between 1 and {}",
            config.max_take
        )));
    }

    let mut pagination = Pagination::new(page, size);
    for param in dedup(sort) {
        let (field, by) = split_pair(param, "sort")?;
        let by = match by.to_ascii_uppercase().as_str() {
            "ASC" => Order::Asc,
            "DESC" => Order::Desc,
            _ => {
                log::info!("Invalid sort filters: {param}");
                return Err(FastgearError::InvalidPagination(format!(
                    "sort direction of \"{field}\" must be ASC or DESC"
                )));
            }
        };
        pagination = pagination.sort(field, by);
    }
    for param in dedup(search) {
        let (field, value) = split_pair(param, "search")?;
        pagination = pagination.search(PaginationSearch::term(field, value));
    }
    Ok(pagination)
}

/// Rejects a request that uses paging attributes a route does not allow.
///
/// `blocked` names attributes among `search`, `sort`, `columns` and
/// `search_all`.
pub fn assert_no_blocked_attributes(blocked: &[&str], pagination: &Pagination) -> Result<()> {
    let present: Vec<&str> = blocked
        .iter()
        .copied()
        .filter(|attr| match *attr {
            "search" => !pagination.search.is_empty(),
            "sort" => !pagination.sort.is_empty(),
            "columns" => !pagination.columns.is_empty(),
            "search_all" => pagination.search_all.is_some(),
            _ => false,
        })
        .collect();
    if present.is_empty() {
        return Ok(());
    }
    log::info!("Invalid block attribute(s): {present:?}");
    Err(FastgearError::InvalidPagination(format!(
        "the attribute(s) {present:?} are blocked in this route and cannot be used"
    )))
}
