/// One catalog page to fetch. `index` is 1-based, matching the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub index: usize,
    pub url: String,
}

/// The full, ordered set of catalog pages for one extraction run.
/// Built before any network activity so the target set is known upfront.
#[derive(Debug, Clone)]
pub struct PagePlan {
    pages: Vec<PageRequest>,
}

impl PagePlan {
    /// Exactly `page_count` pages: `{base_url}/page/1` ..= `{base_url}/page/{page_count}`.
    pub fn new(base_url: &str, page_count: usize) -> Self {
        let base = base_url.trim_end_matches('/');
        let pages = (1..=page_count)
            .map(|index| PageRequest {
                index,
                url: format!("{base}/page/{index}"),
            })
            .collect();
        Self { pages }
    }

    /// Resume from `page` (1-based) onwards. A page past the end yields an empty plan.
    pub fn starting_at(mut self, page: usize) -> Self {
        let skip = page.saturating_sub(1).min(self.pages.len());
        self.pages.drain(..skip);
        self
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    #[cfg(test)]
    pub fn pages(&self) -> &[PageRequest] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<PageRequest> {
        self.pages
    }
}
