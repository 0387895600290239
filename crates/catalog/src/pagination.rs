//! Page slicing for catalog list views.
//!
//! The requested page comes straight from a query string, so it is an
//! arbitrary `Option<&str>`. Resolution never fails:
//!
//! | requested                          | result      |
//! |------------------------------------|-------------|
//! | absent, blank, not an integer      | page 1      |
//! | integer in `1..=num_pages`         | that page   |
//! | integer below 1 or above the range | last page   |
//! | integer too large to represent     | last page   |
//!
//! Items are ordered by descending identity before slicing, so page 1 holds
//! the most recently created records.

use std::num::{IntErrorKind, NonZeroUsize};

use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, Entity};

/// Page size used by the storefront home page product grid.
pub const DEFAULT_PAGE_SIZE: usize = 8;

/// The resolved position of one page inside a collection of `total` items.
///
/// Storage adapters that page in SQL use `offset`/`len` directly as
/// `OFFSET`/`LIMIT`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    /// 1-based page number.
    pub number: usize,
    pub num_pages: usize,
    pub total: usize,
    pub offset: usize,
    pub len: usize,
}

/// One page of items plus the numbers a rendering layer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn from_window(window: PageWindow, items: Vec<T>) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total: window.total,
        }
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Requested {
    NotAnInteger,
    OutOfRange,
    Number(usize),
}

fn parse_requested(raw: Option<&str>) -> Requested {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Requested::NotAnInteger;
    };
    match raw.parse::<i64>() {
        Ok(n) if n >= 1 => usize::try_from(n)
            .map(Requested::Number)
            .unwrap_or(Requested::OutOfRange),
        Ok(_) => Requested::OutOfRange,
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => Requested::OutOfRange,
            _ => Requested::NotAnInteger,
        },
    }
}

/// Splits collections into fixed-size pages.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Paginator {
    per_page: NonZeroUsize,
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            per_page: NonZeroUsize::MIN.saturating_add(DEFAULT_PAGE_SIZE - 1),
        }
    }
}

impl Paginator {
    pub fn new(per_page: usize) -> DomainResult<Self> {
        let per_page = NonZeroUsize::new(per_page)
            .ok_or_else(|| DomainError::validation("page size must be positive"))?;
        Ok(Self { per_page })
    }

    pub fn per_page(&self) -> usize {
        self.per_page.get()
    }

    /// Number of pages for `total` items. An empty collection still has one
    /// (empty) page.
    pub fn num_pages(&self, total: usize) -> usize {
        total.div_ceil(self.per_page.get()).max(1)
    }

    /// Resolve a raw page request against a collection size.
    pub fn resolve(&self, total: usize, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages(total);
        let number = match parse_requested(requested) {
            Requested::NotAnInteger => 1,
            Requested::Number(n) if n <= num_pages => n,
            Requested::Number(_) | Requested::OutOfRange => num_pages,
        };
        let offset = (number - 1) * self.per_page.get();
        let len = total.saturating_sub(offset).min(self.per_page.get());
        PageWindow {
            number,
            num_pages,
            total,
            offset,
            len,
        }
    }

    /// Order `items` newest first (descending id) and return the requested page.
    pub fn page<T: Entity>(&self, mut items: Vec<T>, requested: Option<&str>) -> Page<T> {
        items.sort_by(|a, b| b.id().cmp(&a.id()));
        let window = self.resolve(items.len(), requested);
        let page_items = items
            .into_iter()
            .skip(window.offset)
            .take(window.len)
            .collect();
        Page::from_window(window, page_items)
    }
}
