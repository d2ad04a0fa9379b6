//! Generic bounded pagination over `(offset, limit) -> page` endpoints

use std::future::Future;

use super::ApiError;

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Why a walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An empty page came back.
    Exhausted,
    /// The page was shorter than the requested limit.
    ShortPage,
    /// The configured item ceiling was reached.
    Ceiling,
    /// A page fetch failed; items collected so far are kept.
    UpstreamError,
}

#[derive(Debug)]
pub struct WalkOutcome<T> {
    pub items: Vec<T>,
    pub stop: StopReason,
}

impl<T> WalkOutcome<T> {
    /// True when the walk ended early on an upstream failure, i.e. the
    /// collected items are a prefix of the real result set.
    pub fn is_partial(&self) -> bool {
        self.stop == StopReason::UpstreamError
    }
}

/// Drive a paged endpoint to completion or to `max_items`.
///
/// Termination rules are evaluated in order for every page: empty page,
/// short page, ceiling. An upstream error terminates the walk but returns
/// whatever was collected. Upstream ordering is preserved; no deduplication
/// happens here.
pub async fn walk<T, F, Fut>(
    mut fetch_page: F,
    page_size: usize,
    max_items: Option<usize>,
) -> WalkOutcome<T>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ApiError>>,
{
    let mut items: Vec<T> = Vec::new();
    let mut offset = 0usize;

    let stop = loop {
        tracing::debug!(offset, limit = page_size, "fetching page");
        let page = match fetch_page(offset, page_size).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(offset, collected = items.len(), error = %e, "page fetch failed");
                break StopReason::UpstreamError;
            }
        };

        let fetched = page.len();
        tracing::debug!(offset, fetched, "page received");

        if fetched == 0 {
            break StopReason::Exhausted;
        }
        items.extend(page);
        if fetched < page_size {
            break StopReason::ShortPage;
        }
        if let Some(max) = max_items {
            if items.len() >= max {
                break StopReason::Ceiling;
            }
        }
        offset += page_size;
    };

    tracing::info!(total = items.len(), stop = ?stop, "pagination walk finished");
    WalkOutcome { items, stop }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn paged_source(items: Vec<i64>) -> impl FnMut(usize, usize) -> std::future::Ready<Result<Vec<i64>, ApiError>>
    {
        move |offset, limit| {
            let page: Vec<i64> = items.iter().skip(offset).take(limit).copied().collect();
            std::future::ready(Ok(page))
        }
    }

    #[tokio::test]
    async fn collects_all_items_in_order() {
        let source: Vec<i64> = (0..250).collect();
        let outcome = walk(paged_source(source.clone()), 100, None).await;
        assert_eq!(outcome.items, source);
        assert_eq!(outcome.stop, StopReason::ShortPage);
    }

    #[tokio::test]
    async fn exact_multiple_terminates_on_empty_page() {
        let source: Vec<i64> = (0..200).collect();
        let outcome = walk(paged_source(source.clone()), 100, None).await;
        assert_eq!(outcome.items, source);
        assert_eq!(outcome.stop, StopReason::Exhausted);
    }

    #[tokio::test]
    async fn ceiling_stops_the_walk() {
        let source: Vec<i64> = (0..1000).collect();
        let outcome = walk(paged_source(source), 100, Some(250)).await;
        assert_eq!(outcome.items.len(), 300);
        assert_eq!(outcome.stop, StopReason::Ceiling);
    }

    #[tokio::test]
    async fn short_page_wins_over_ceiling() {
        // 50 items with a ceiling of 40: the first page is already short,
        // and the short-page rule is evaluated before the ceiling.
        let source: Vec<i64> = (0..50).collect();
        let outcome = walk(paged_source(source), 100, Some(40)).await;
        assert_eq!(outcome.items.len(), 50);
        assert_eq!(outcome.stop, StopReason::ShortPage);
    }

    #[tokio::test]
    async fn upstream_error_keeps_collected_items() {
        let calls = Arc::new(Mutex::new(0usize));
        let outcome = walk(
            {
                let calls = calls.clone();
                move |_offset, limit| {
                    let mut n = calls.lock().unwrap();
                    *n += 1;
                    let result = if *n == 1 {
                        Ok((0..limit as i64).collect())
                    } else {
                        Err(ApiError::HttpStatus(503))
                    };
                    std::future::ready(result)
                }
            },
            100,
            None,
        )
        .await;
        assert_eq!(outcome.items.len(), 100);
        assert!(outcome.is_partial());
    }

    #[test]
    fn empty_source_is_exhausted() {
        let outcome = tokio_test::block_on(walk(paged_source(Vec::new()), 100, None));
        assert!(outcome.items.is_empty());
        assert_eq!(outcome.stop, StopReason::Exhausted);
    }
}
