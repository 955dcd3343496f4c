//! Sparse row cache
//!
//! Rows live at their absolute result index. When the server pages its results, the cache
//! remembers which pages are fetched and plans the smallest page-aligned window that covers a
//! requested range. Adjacent missing pages are fetched in one request.

use std::collections::{BTreeMap, BTreeSet};

/// What a range request needs from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    /// Everything needed is already resident.
    Cached,
    /// Fetch `top` rows starting at `skip`; `None` means all remaining rows.
    Fetch { skip: usize, top: Option<usize> },
}

#[derive(Debug, Clone)]
pub struct RowCache<T> {
    rows: BTreeMap<usize, T>,
    fetched_pages: BTreeSet<usize>,
    page_size: Option<usize>,
    total_items: usize,
    has_searched: bool,
}

impl<T> Default for RowCache<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            fetched_pages: BTreeSet::new(),
            page_size: None,
            total_items: 0,
            has_searched: false,
        }
    }
}

impl<T: Clone> RowCache<T> {
    pub fn new(page_size: Option<usize>) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    /// `None` until the server reports paging; `Some(0)` means unpaged.
    pub fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn has_searched(&self) -> bool {
        self.has_searched
    }

    /// One past the highest resident index.
    pub fn count(&self) -> usize {
        self.rows.keys().next_back().map(|i| i + 1).unwrap_or(0)
    }

    pub fn resident(&self) -> usize {
        self.rows.len()
    }

    pub fn is_page_fetched(&self, page: usize) -> bool {
        self.fetched_pages.contains(&page)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.rows.get(&index)
    }

    /// Drop every row and fetched page. Paging stays known.
    pub fn reset(&mut self) {
        self.rows.clear();
        self.fetched_pages.clear();
        self.total_items = 0;
        self.has_searched = false;
    }

    /// Record paging reported by a result. A missing page size keeps the current one.
    pub fn apply_paging(&mut self, total_items: Option<usize>, page_size: Option<usize>) {
        if let Some(page_size) = page_size {
            self.page_size = Some(page_size);
        }
        if let Some(total_items) = total_items {
            self.total_items = total_items;
        }
        self.has_searched = true;
    }

    /// Store `items` from index `skip` and mark the pages they cover as fetched.
    pub fn store(&mut self, skip: usize, items: impl IntoIterator<Item = T>) -> usize {
        let mut stored: usize = 0;
        for (offset, item) in items.into_iter().enumerate() {
            self.rows.insert(skip + offset, item);
            stored += 1;
        }

        if let Some(page_size) = self.page_size.filter(|p| *p > 0) {
            let first = skip / page_size;
            let pages = stored.div_ceil(page_size).max(1);
            self.fetched_pages.extend(first..first + pages);
        }
        stored
    }

    /// Rows present in `skip..skip + count`, in index order.
    pub fn rows_in(&self, skip: usize, count: usize) -> Vec<T> {
        self.rows
            .range(skip..skip.saturating_add(count))
            .map(|(_, row)| row.clone())
            .collect()
    }

    /// Every resident row, in index order.
    pub fn rows(&self) -> Vec<T> {
        self.rows.values().cloned().collect()
    }

    /// Plan the request needed to make `skip..skip + count` resident.
    pub fn plan(&self, skip: usize, count: usize) -> FetchPlan {
        if count == 0 {
            return FetchPlan::Cached;
        }

        match self.page_size {
            Some(0) if self.has_searched => FetchPlan::Cached,
            Some(0) => FetchPlan::Fetch { skip: 0, top: None },
            Some(page_size) => {
                let mut start = skip / page_size;
                let mut end = (skip + count - 1) / page_size;
                while start < end && self.is_page_fetched(start) {
                    start += 1;
                }
                while end > start && self.is_page_fetched(end) {
                    end -= 1;
                }

                if start == end && self.is_page_fetched(start) {
                    FetchPlan::Cached
                } else {
                    FetchPlan::Fetch {
                        skip: start * page_size,
                        top: Some((end - start + 1) * page_size),
                    }
                }
            }
            None => FetchPlan::Fetch {
                skip,
                top: Some(count),
            },
        }
    }
}
