//! Paginated list envelope returned by every list endpoint.

use serde::{Deserialize, Serialize};

/// One page of a server-side list.
///
/// `is_last` comes from the server's `last` flag and is authoritative for
/// whether a following page exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_pages: u32,
    #[serde(rename = "last")]
    pub is_last: bool,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, total_pages: u32, is_last: bool) -> Self {
        Self {
            content,
            total_pages,
            is_last,
        }
    }

    /// Build page `index` of `items` split into pages of `size`.
    pub fn slice(items: &[T], index: u32, size: u32) -> Self
    where
        T: Clone,
    {
        let size = size.max(1) as usize;
        let total_pages = items.len().div_ceil(size) as u32;
        let start = (index as usize).saturating_mul(size).min(items.len());
        let end = start.saturating_add(size).min(items.len());
        Self {
            content: items[start..end].to_vec(),
            total_pages,
            is_last: index.saturating_add(1) >= total_pages,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wire_envelope() {
        let page: Page<u32> =
            serde_json::from_str(r#"{"content":[1,2],"totalPages":3,"last":false}"#).unwrap();
        assert_eq!(page.content, vec![1, 2]);
        assert_eq!(page.total_pages, 3);
        assert!(!page.is_last);
    }

    #[test]
    fn slice_marks_the_final_page() {
        let items: Vec<u32> = (0..5).collect();
        let first = Page::slice(&items, 0, 2);
        assert_eq!(first.content, vec![0, 1]);
        assert_eq!(first.total_pages, 3);
        assert!(!first.is_last);

        let last = Page::slice(&items, 2, 2);
        assert_eq!(last.content, vec![4]);
        assert!(last.is_last);

        let empty = Page::<u32>::slice(&[], 0, 10);
        assert!(empty.is_empty());
        assert!(empty.is_last);
    }

    #[test]
    fn slice_past_the_end_is_an_empty_last_page() {
        let items: Vec<u32> = (0..5).collect();
        let page = Page::slice(&items, u32::MAX, 10);
        assert!(page.is_empty());
        assert_eq!(page.total_pages, 1);
        assert!(page.is_last);

        let page = Page::slice(&items, u32::MAX, u32::MAX);
        assert!(page.is_empty());
        assert!(page.is_last);
    }
}
