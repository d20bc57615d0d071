/// Shared helpers for catalog text and page windows
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static SLUG_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());

/// Lowercases and hyphenates `value` for use in URLs.
///
/// Letters and digits of any script are kept, so Arabic names produce
/// Arabic slugs instead of empty strings.
pub fn slugify(value: &str) -> String {
    let lowered = value.to_lowercase();
    let cleaned = NON_SLUG_CHARS.replace_all(&lowered, "");
    let hyphenated = SLUG_SEPARATORS.replace_all(cleaned.trim(), "-");
    hyphenated.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Parses an optional price filter, ignoring anything that is not a number
pub fn parse_decimal_filter(raw: Option<&str>) -> Option<Decimal> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| Decimal::from_str(s).ok())
}

/// A resolved page of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub per_page: u64,
    pub total_items: u64,
    pub has_next: bool,
    pub has_previous: bool,
    pub is_paginated: bool,
}

impl PageWindow {
    /// Zero-based page index for `Paginator::fetch_page`
    pub fn index(&self) -> u64 {
        self.number - 1
    }
}

/// Resolves a raw `page` parameter against a listing size.
///
/// Missing or non-numeric input selects the first page; numbers outside
/// `1..=num_pages` select the last page. An empty listing still has one page.
pub fn resolve_page(raw: Option<&str>, total_items: u64, per_page: u64) -> PageWindow {
    let per_page = per_page.max(1);
    let num_pages = if total_items == 0 {
        1
    } else {
        (total_items + per_page - 1) / per_page
    };

    let number = match raw.map(str::trim).map(i64::from_str) {
        None | Some(Err(_)) => 1,
        Some(Ok(n)) if n >= 1 && (n as u64) <= num_pages => n as u64,
        Some(Ok(_)) => num_pages,
    };

    PageWindow {
        number,
        num_pages,
        per_page,
        total_items,
        has_next: number < num_pages,
        has_previous: number > 1,
        is_paginated: num_pages > 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case("Summer Dresses", "summer-dresses")]
    #[case("  T-Shirts & Tops!! ", "t-shirts-tops")]
    #[case("Kids' Shoes -- Sale", "kids-shoes-sale")]
    #[case("ملابس نسائية", "ملابس-نسائية")]
    #[case("__Hidden__", "hidden")]
    #[case("!!!", "")]
    fn slugify_examples(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(slugify(input), expected);
    }

    #[rstest]
    #[case(None, 1)]
    #[case(Some("2"), 2)]
    #[case(Some("abc"), 1)]
    #[case(Some(""), 1)]
    #[case(Some("99"), 3)]
    #[case(Some("0"), 3)]
    #[case(Some("-4"), 3)]
    fn resolve_page_examples(#[case] raw: Option<&str>, #[case] expected: u64) {
        let window = resolve_page(raw, 30, 12);
        assert_eq!(window.num_pages, 3);
        assert_eq!(window.number, expected);
    }

    #[test]
    fn empty_listing_has_single_unpaginated_page() {
        let window = resolve_page(Some("5"), 0, 12);
        assert_eq!(window.number, 1);
        assert_eq!(window.num_pages, 1);
        assert!(!window.is_paginated);
        assert!(!window.has_next);
        assert!(!window.has_previous);
    }

    #[test]
    fn price_filters_ignore_garbage() {
        assert_eq!(parse_decimal_filter(Some("12.50")), Some(dec!(12.50)));
        assert_eq!(parse_decimal_filter(Some(" 7 ")), Some(dec!(7)));
        assert_eq!(parse_decimal_filter(Some("cheap")), None);
        assert_eq!(parse_decimal_filter(Some("")), None);
        assert_eq!(parse_decimal_filter(None), None);
    }

    proptest! {
        #[test]
        fn resolved_page_is_always_in_range(raw in ".{0,6}", total in 0u64..500, per_page in 1u64..50) {
            let window = resolve_page(Some(&raw), total, per_page);
            prop_assert!(window.number >= 1);
            prop_assert!(window.number <= window.num_pages);
        }

        #[test]
        fn slugs_never_contain_whitespace(name in "\\PC{0,40}") {
            let slug = slugify(&name);
            prop_assert!(!slug.chars().any(char::is_whitespace));
            prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
        }
    }
}
