//! Paginated blob enumeration with per-page retry

use std::collections::HashSet;
use std::time::Duration;

use futures::stream::{self, Stream, TryStreamExt};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::artifact::error::ListingError;
use crate::artifact::types::BlobEntry;
use crate::config::ListingConfig;

/// One page of a container listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobPage {
    pub blobs: Vec<BlobEntry>,
    /// Continuation marker, None on the last page
    pub next_marker: Option<String>,
}

/// Trait for enumerating blobs from a remote container
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Base URL of a container; artifact URLs are `{container_url}/{blob name}`
    fn container_url(&self, account: &str, container: &str) -> String;

    /// Fetches a single listing page
    ///
    /// # Arguments
    /// * `container_url` - Value returned by [`BlobStore::container_url`]
    /// * `prefix` - Only blobs whose names start with this prefix
    /// * `marker` - Continuation marker of the previous page, None for the first page
    async fn fetch_page(
        &self,
        container_url: &str,
        prefix: Option<&str>,
        marker: Option<&str>,
    ) -> Result<BlobPage, ListingError>;
}

/// How often a page is attempted and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl From<&ListingConfig> for RetryPolicy {
    fn from(config: &ListingConfig) -> Self {
        Self {
            max_attempts: config.max_page_attempts.max(1),
            delay: config.retry_delay(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&ListingConfig::default())
    }
}

/// Position in a listing: the marker of the next page to fetch and the
/// attempts left for that page. Moving to a new marker restores the budget.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PageCursor {
    marker: Option<String>,
    attempts_remaining: u32,
    max_attempts: u32,
    /// Every marker already followed, a repeat means the listing cycles
    visited: HashSet<String>,
}

impl PageCursor {
    fn new(max_attempts: u32) -> Self {
        Self {
            marker: None,
            attempts_remaining: max_attempts,
            max_attempts,
            visited: HashSet::new(),
        }
    }

    /// Consume one attempt, returns false once the budget is spent
    fn record_failure(&mut self) -> bool {
        self.attempts_remaining = self.attempts_remaining.saturating_sub(1);
        self.attempts_remaining > 0
    }

    fn attempts_used(&self) -> u32 {
        self.max_attempts - self.attempts_remaining
    }

    /// Move past the current page. None means the listing is complete.
    fn advance(mut self, next_marker: Option<String>) -> Result<Option<Self>, ListingError> {
        let Some(next) = next_marker.filter(|m| !m.is_empty()) else {
            return Ok(None);
        };
        if !self.visited.insert(next.clone()) {
            return Err(ListingError::Stalled(Some(next)));
        }
        Ok(Some(Self {
            marker: Some(next),
            attempts_remaining: self.max_attempts,
            max_attempts: self.max_attempts,
            visited: self.visited,
        }))
    }
}

async fn fetch_page_with_retry(
    store: &dyn BlobStore,
    container_url: &str,
    prefix: Option<&str>,
    cursor: &mut PageCursor,
    policy: &RetryPolicy,
) -> Result<BlobPage, ListingError> {
    loop {
        let error = match store
            .fetch_page(container_url, prefix, cursor.marker.as_deref())
            .await
        {
            Ok(page) => return Ok(page),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => e,
        };

        if !cursor.record_failure() {
            warn!(
                "Giving up on {} page {:?} after {} attempts: {}",
                container_url,
                cursor.marker,
                cursor.attempts_used(),
                error
            );
            return Err(ListingError::RetriesExhausted {
                marker: cursor.marker.clone(),
                attempts: cursor.attempts_used(),
                last_error: Box::new(error),
            });
        }

        warn!(
            "Listing {} page {:?} failed (attempt {}/{}): {}",
            container_url,
            cursor.marker,
            cursor.attempts_used(),
            cursor.max_attempts,
            error
        );
        sleep(policy.delay).await;
    }
}

/// Lazily enumerate a container one page at a time.
///
/// The stream ends with an error if any page exhausts its retry budget, so a
/// consumer never mistakes a truncated listing for a complete one.
pub fn blob_pages<'a>(
    store: &'a dyn BlobStore,
    container_url: &'a str,
    prefix: Option<&'a str>,
    policy: RetryPolicy,
) -> impl Stream<Item = Result<Vec<BlobEntry>, ListingError>> + 'a {
    stream::try_unfold(
        Some(PageCursor::new(policy.max_attempts)),
        move |cursor| async move {
            let Some(mut cursor) = cursor else {
                return Ok(None);
            };
            let page =
                fetch_page_with_retry(store, container_url, prefix, &mut cursor, &policy).await?;
            debug!(
                "Fetched {} blobs from {} (marker {:?})",
                page.blobs.len(),
                container_url,
                cursor.marker
            );
            let next = cursor.advance(page.next_marker)?;
            Ok(Some((page.blobs, next)))
        },
    )
}

/// Enumerate every blob under `prefix`, in listing order
pub async fn list_blobs(
    store: &dyn BlobStore,
    container_url: &str,
    prefix: Option<&str>,
    policy: RetryPolicy,
) -> Result<Vec<BlobEntry>, ListingError> {
    let pages: Vec<Vec<BlobEntry>> = blob_pages(store, container_url, prefix, policy)
        .try_collect()
        .await?;
    Ok(pages.into_iter().flatten().collect())
}
