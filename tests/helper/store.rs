//! Blob store test utilities

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use artifact_resolver::artifact::clock::Clock;
use artifact_resolver::artifact::error::ListingError;
use artifact_resolver::artifact::lister::{BlobPage, BlobStore};
use artifact_resolver::artifact::resolver::ArtifactResolver;
use artifact_resolver::artifact::types::BlobEntry;
use artifact_resolver::config::ResolverConfig;

pub const DEFAULT_ACCOUNT: &str = "artifacts";
pub const INSIDER_ACCOUNT: &str = "insider";

/// In-memory container listing served in fixed-size pages.
///
/// Markers are `page-N`. Failures can be scheduled per page index to
/// exercise the retry budget.
pub struct MemoryStore {
    containers: HashMap<String, Vec<BlobEntry>>,
    page_size: usize,
    failures: Mutex<HashMap<usize, u32>>,
    calls: AtomicUsize,
    requested_pages: Mutex<Vec<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            containers: HashMap::new(),
            page_size: usize::MAX,
            failures: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            requested_pages: Mutex::new(Vec::new()),
        }
    }

    pub fn with_container(mut self, account: &str, container: &str, blobs: Vec<BlobEntry>) -> Self {
        let url = container_url(account, container);
        self.containers.insert(url, blobs);
        self
    }

    /// Shorthand for the default account's sandbox container
    pub fn with_sandbox(self, blobs: Vec<BlobEntry>) -> Self {
        self.with_container(DEFAULT_ACCOUNT, "sandbox", blobs)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fail the next `times` fetches of page `page` with a 503
    pub fn fail_page(self, page: usize, times: u32) -> Self {
        self.failures.lock().unwrap().insert(page, times);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Page indexes in the order they were requested, failed attempts included
    pub fn requested_pages(&self) -> Vec<usize> {
        self.requested_pages.lock().unwrap().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

pub fn container_url(account: &str, container: &str) -> String {
    format!("mem://{}/{}", account, container)
}

fn page_index(marker: Option<&str>) -> usize {
    marker
        .and_then(|m| m.strip_prefix("page-"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl BlobStore for MemoryStore {
    fn container_url(&self, account: &str, container: &str) -> String {
        container_url(account, container)
    }

    async fn fetch_page(
        &self,
        container_url: &str,
        prefix: Option<&str>,
        marker: Option<&str>,
    ) -> Result<BlobPage, ListingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let page = page_index(marker);
        self.requested_pages.lock().unwrap().push(page);

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&page)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(ListingError::Status {
                    status: 503,
                    url: container_url.to_string(),
                });
            }
        }

        let blobs: Vec<BlobEntry> = self
            .containers
            .get(container_url)
            .ok_or_else(|| ListingError::ContainerNotFound(container_url.to_string()))?
            .iter()
            .filter(|blob| prefix.is_none_or(|p| blob.name.starts_with(p)))
            .cloned()
            .collect();

        let start = page.saturating_mul(self.page_size).min(blobs.len());
        let end = start.saturating_add(self.page_size).min(blobs.len());
        let next_marker = (end < blobs.len()).then(|| format!("page-{}", page + 1));

        Ok(BlobPage {
            blobs: blobs[start..end].to_vec(),
            next_marker,
        })
    }
}

/// Clock frozen at a fixed instant
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// 2024-05-`day` `hour`:00 UTC. 2024-05-01 is a Wednesday.
pub fn may(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
}

/// Blobs published at the same instant
pub fn blobs(names: &[&str], published: DateTime<Utc>) -> Vec<BlobEntry> {
    names
        .iter()
        .map(|name| BlobEntry::new(*name, published))
        .collect()
}

/// Config pointing at the in-memory accounts, with no delay between retries
pub fn test_config() -> ResolverConfig {
    let mut config = ResolverConfig::default();
    config.storage.default_account = DEFAULT_ACCOUNT.to_string();
    config.storage.insider_account = INSIDER_ACCOUNT.to_string();
    config.listing.retry_delay_ms = 0;
    config
}

pub fn create_test_resolver(store: Arc<MemoryStore>, now: DateTime<Utc>) -> ArtifactResolver {
    ArtifactResolver::new(store, &test_config()).with_clock(Arc::new(FixedClock(now)))
}
