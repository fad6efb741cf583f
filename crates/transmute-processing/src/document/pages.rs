//! Page selection expressions (`1-3,5`)

use std::collections::BTreeSet;
use transmute_core::AppError;

/// Parse a comma-separated list of 1-based pages and inclusive ranges against a document
/// of `page_count` pages
pub fn parse_page_ranges(expression: &str, page_count: u32) -> Result<BTreeSet<u32>, AppError> {
    let mut selected = BTreeSet::new();

    for token in expression.split(',').map(str::trim) {
        if token.is_empty() {
            return Err(invalid(expression, "empty entry"));
        }

        let (start, end) = match token.split_once('-') {
            Some((start, end)) => (parse_page(start, expression)?, parse_page(end, expression)?),
            None => {
                let page = parse_page(token, expression)?;
                (page, page)
            }
        };

        if start > end {
            return Err(invalid(expression, &format!("range {} is reversed", token)));
        }
        if end > page_count {
            return Err(AppError::ValidationFailure(format!(
                "Page {} is out of range; the document has {} pages",
                end, page_count
            )));
        }

        selected.extend(start..=end);
    }

    Ok(selected)
}

fn parse_page(raw: &str, expression: &str) -> Result<u32, AppError> {
    match raw.trim().parse::<u32>() {
        Ok(0) => Err(invalid(expression, "pages are numbered from 1")),
        Ok(page) => Ok(page),
        Err(_) => Err(invalid(expression, &format!("'{}' is not a page number", raw.trim()))),
    }
}

fn invalid(expression: &str, reason: &str) -> AppError {
    AppError::ValidationFailure(format!("Invalid page selection '{}': {}", expression, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_and_singles() {
        let selected = parse_page_ranges("1-3, 5", 6).unwrap();
        assert_eq!(selected.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 5]);
    }

    #[test]
    fn test_overlaps_collapse() {
        let selected = parse_page_ranges("2-4,3", 4).unwrap();
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn test_invalid_selections() {
        for expression in ["", "0", "3-1", "a", "1,,2", "7", "1-9"] {
            let err = parse_page_ranges(expression, 6).unwrap_err();
            assert!(err.is_validation(), "{expression:?} should be rejected");
        }
    }
}
