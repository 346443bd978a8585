//! In-memory filtering and pagination shared by every list view and the matching `/api` collection
//! endpoints. Collections are fetched whole and narrowed here, which is fine for a school's worth
//! of records.

use serde::{Deserialize, Serialize};
use std::{borrow::Cow, ops::RangeInclusive};

pub const PAGE_SIZE: usize = 10;
/// Most page links shown at once.
pub const PAGE_WINDOW: usize = 5;

pub trait Searchable {
    /// The fields the free-text search box looks through (names, codes, emails...).
    fn search_fields(&self) -> Vec<Cow<'_, str>>;
}

/// Case-insensitive substring match on any of the item's search fields. Blank terms match everything.
pub fn matches_search<T: Searchable>(item: &T, term: Option<&str>) -> bool {
    let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
        return true;
    };
    let term = term.to_lowercase();

    item.search_fields()
        .into_iter()
        .any(|field| field.to_lowercase().contains(&term))
}

/// Equality on one category. No filter, a blank one, or `all` lets everything through.
pub fn category_matches(filter: Option<&str>, value: &str) -> bool {
    match filter.map(str::trim) {
        None | Some("" | "all") => true,
        Some(filter) => filter == value,
    }
}

/// The query string every list view and collection endpoint understands. Filters that don't apply
/// to a collection are ignored.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub program: Option<String>,
    pub year: Option<String>,
    pub status: Option<String>,
    pub audience: Option<String>,
    pub page: Option<usize>,
}

impl ListQuery {
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn program(&self) -> Option<&str> {
        self.program.as_deref()
    }

    pub fn year(&self) -> Option<&str> {
        self.year.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }

    pub fn filter<T: Searchable>(&self, items: Vec<T>, accepts: impl Fn(&T) -> bool) -> Page<T> {
        filter_and_paginate(items, self.search(), accepts, self.page)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
    pub page_size: usize,
}

impl<T> Page<T> {
    pub fn window(&self) -> RangeInclusive<usize> {
        page_window(self.page, self.total_pages)
    }

    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Slices out one page. Pages are 1-based, and anything past the end clamps to the last page.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total = items.len();
    let total_pages = total.div_ceil(page_size);
    let page = page.clamp(1, total_pages.max(1));

    let items = items
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    Page {
        items,
        page,
        total_pages,
        total,
        page_size,
    }
}

/// Search, then the category predicate, then [`PAGE_SIZE`] pagination.
pub fn filter_and_paginate<T: Searchable>(
    items: Vec<T>,
    search: Option<&str>,
    accepts: impl Fn(&T) -> bool,
    page: Option<usize>,
) -> Page<T> {
    let filtered = items
        .into_iter()
        .filter(|item| matches_search(item, search) && accepts(item))
        .collect();
    paginate(filtered, page.unwrap_or(1), PAGE_SIZE)
}

/// The page numbers to show links for: all of them up to [`PAGE_WINDOW`], otherwise a window
/// centred on `current` and pushed back in at either end.
pub fn page_window(current: usize, total_pages: usize) -> RangeInclusive<usize> {
    if total_pages <= PAGE_WINDOW {
        return 1..=total_pages;
    }

    let half = PAGE_WINDOW / 2;
    let start = current
        .saturating_sub(half)
        .clamp(1, total_pages - PAGE_WINDOW + 1);
    start..=start + PAGE_WINDOW - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        name: &'static str,
        code: &'static str,
        email: &'static str,
        program: &'static str,
    }

    impl Searchable for Row {
        fn search_fields(&self) -> Vec<Cow<'_, str>> {
            vec![self.name.into(), self.code.into(), self.email.into()]
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                name: "Amina Yusuf",
                code: "S-001",
                email: "amina@school.example",
                program: "sciences",
            },
            Row {
                name: "Bilal Haddad",
                code: "S-002",
                email: "B.Haddad@School.example",
                program: "letters",
            },
            Row {
                name: "Khadija Benali",
                code: "S-003",
                email: "khadija@school.example",
                program: "sciences",
            },
        ]
    }

    #[test]
    fn email_search_ignores_case() {
        let page = filter_and_paginate(rows(), Some("b.HADDAD@"), |_| true, None);
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].code, "S-002");
    }

    #[test]
    fn search_covers_names_and_codes() {
        let page = filter_and_paginate(rows(), Some("s-003"), |_| true, None);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Khadija Benali");

        let page = filter_and_paginate(rows(), Some("   "), |_| true, None);
        assert_eq!(page.total, 3);
    }

    #[test]
    fn categories_are_a_conjunction() {
        let program = Some("sciences");
        let page = filter_and_paginate(
            rows(),
            Some("a"),
            |row| category_matches(program, row.program),
            None,
        );
        assert_eq!(page.total, 2);

        let page = filter_and_paginate(
            rows(),
            Some("bilal"),
            |row| category_matches(program, row.program),
            None,
        );
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn blank_or_all_category_matches_everything() {
        assert!(category_matches(None, "x"));
        assert!(category_matches(Some(""), "x"));
        assert!(category_matches(Some("all"), "x"));
        assert!(!category_matches(Some("y"), "x"));
    }

    #[test]
    fn twenty_three_items_make_three_pages() {
        let items: Vec<usize> = (0..23).collect();
        let page = paginate(items.clone(), 3, PAGE_SIZE);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.items, vec![20, 21, 22]);
        assert!(page.has_prev());
        assert!(!page.has_next());

        let first = paginate(items, 1, PAGE_SIZE);
        assert_eq!(first.items.len(), 10);
        assert!(first.has_next());
    }

    #[test]
    fn out_of_range_pages_clamp() {
        let items: Vec<usize> = (0..23).collect();
        assert_eq!(paginate(items.clone(), 0, PAGE_SIZE).page, 1);
        assert_eq!(paginate(items, 99, PAGE_SIZE).page, 3);
        assert_eq!(paginate(Vec::<usize>::new(), 4, PAGE_SIZE).page, 1);
    }

    #[test]
    fn window_shows_everything_when_small() {
        assert_eq!(page_window(1, 0), 1..=0);
        assert_eq!(page_window(2, 3), 1..=3);
        assert_eq!(page_window(5, 5), 1..=5);
    }

    #[test]
    fn window_recentres_when_large() {
        assert_eq!(page_window(1, 12), 1..=5);
        assert_eq!(page_window(3, 12), 1..=5);
        assert_eq!(page_window(4, 12), 2..=6);
        assert_eq!(page_window(7, 12), 5..=9);
        assert_eq!(page_window(11, 12), 8..=12);
        assert_eq!(page_window(12, 12), 8..=12);
    }
}
