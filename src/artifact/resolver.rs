//! Resolution engine: listing → filter → strategy, plus composite strategies
//!
//! Composite strategies (Daily, Weekly, Current, NextMinor, NextMajor) never
//! list directly. They issue listing resolutions with adjusted parameters and
//! combine the results, so a resolution is at most two levels deep.

use std::sync::Arc;

use chrono::{DateTime, Utc, Weekday};
use tracing::{debug, info};

use crate::artifact::cache::{
    CachedResolution, ResolutionCache, freshness_threshold, validate_expiration,
};
use crate::artifact::clock::{Clock, SystemClock, start_of_day, start_of_week};
use crate::artifact::error::{ListingError, RequestError, ResolveError};
use crate::artifact::filter::{CountryAliases, FilterCriteria, filter_candidates};
use crate::artifact::lister::{BlobStore, RetryPolicy, list_blobs};
use crate::artifact::request::ResolutionRequest;
use crate::artifact::stores::AzureBlobStore;
use crate::artifact::strategy::{Selection, select};
use crate::artifact::types::{ArtifactType, SelectStrategy};
use crate::artifact::version::Version;
use crate::config::{ResolverConfig, StorageConfig};

/// Country whose latest sandbox release defines the current version for NextMinor/NextMajor
const BASE_COUNTRY: &str = "base";

/// Country used on the insider channel when the request has none
const FALLBACK_COUNTRY: &str = "w1";

/// A minor version at or above this rolls NextMinor over to the next major
const LAST_MINOR: u32 = 5;

/// A selected artifact with its download URL
#[derive(Debug, Clone, PartialEq, Eq)]
struct Resolved {
    url: String,
    version: Version,
}

/// Resolves requests against a blob store
pub struct ArtifactResolver {
    store: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    storage: StorageConfig,
    aliases: CountryAliases,
    retry: RetryPolicy,
    week_start: Weekday,
    default_expiration_secs: u64,
}

impl ArtifactResolver {
    /// Create a resolver listing through `store`
    pub fn new(store: Arc<dyn BlobStore>, config: &ResolverConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            storage: config.storage.clone(),
            aliases: CountryAliases::with_overrides(&config.country_aliases),
            retry: RetryPolicy::from(&config.listing),
            week_start: config.calendar.week_start,
            default_expiration_secs: config.cache.default_expiration_secs,
        }
    }

    /// Create a resolver for the blob endpoint named in `config`
    pub fn from_config(config: &ResolverConfig) -> Result<Self, ListingError> {
        let store = AzureBlobStore::new(
            &config.storage.endpoint,
            config.listing.request_timeout(),
        )?;
        Ok(Self::new(Arc::new(store), config))
    }

    /// Replace the time source used for periodic boundaries and cache stamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Resolve a request to its artifact URLs.
    ///
    /// Returns every match ascending for `All`, otherwise zero or one URL.
    /// An empty result means nothing matched and is not an error.
    pub async fn resolve(&self, request: &ResolutionRequest) -> Result<Vec<String>, ResolveError> {
        request.validate(&self.storage.insider_account)?;
        if request.select.is_composite() {
            debug!("Resolving {} through sub-resolutions", request.select);
        }

        let resolved = match request.select {
            SelectStrategy::All => self.resolve_listing(request, Selection::All).await?,
            SelectStrategy::Latest => self.resolve_listing(request, Selection::Latest).await?,
            SelectStrategy::First => self.resolve_listing(request, Selection::First).await?,
            SelectStrategy::SecondToLastMajor => {
                self.resolve_listing(request, Selection::SecondToLastMajor)
                    .await?
            }
            SelectStrategy::Closest => {
                let target = Version::parse_full(&request.version).map_err(RequestError::from)?;
                self.resolve_listing(request, Selection::Closest(target))
                    .await?
            }
            SelectStrategy::Daily => {
                let boundary = start_of_day(self.clock.now());
                self.resolve_periodic(request, boundary).await?
            }
            SelectStrategy::Weekly => {
                let boundary = start_of_week(self.clock.now(), self.week_start);
                self.resolve_periodic(request, boundary).await?
            }
            SelectStrategy::Current => self.resolve_current(request).await?,
            SelectStrategy::NextMinor | SelectStrategy::NextMajor => {
                self.resolve_next(request).await?
            }
        };

        info!(
            "Resolved {} (select={}, country='{}') to {} artifact(s)",
            request.artifact_type,
            request.select,
            request.country,
            resolved.len()
        );
        Ok(resolved.into_iter().map(|r| r.url).collect())
    }

    /// Resolve through `cache`, serving an entry younger than the freshness window.
    ///
    /// `expiration_secs` overrides the configured window and must be at least
    /// 900 seconds. Failed or empty resolutions are never written.
    pub async fn resolve_cached(
        &self,
        request: &ResolutionRequest,
        cache: &ResolutionCache,
        expiration_secs: Option<u64>,
    ) -> Result<CachedResolution, ResolveError> {
        let expiration = match expiration_secs {
            Some(seconds) => validate_expiration(seconds)?,
            None => self.default_expiration_secs,
        };
        request.validate(&self.storage.insider_account)?;

        let now = self.clock.now();
        let signature = request.signature();
        let threshold = freshness_threshold(now, expiration);
        if let Some(entry) = cache.get_fresh(&signature, threshold) {
            debug!("Cache hit for '{}'", signature);
            return Ok(CachedResolution {
                url: entry.url,
                from_cache: true,
                cached_at: Some(entry.created_at),
            });
        }

        debug!("Cache miss for '{}'", signature);
        let url = self.resolve(request).await?.join("\n");
        let cached_at = if url.is_empty() {
            None
        } else {
            cache.put_at(&signature, &url, now);
            Some(now)
        };

        Ok(CachedResolution {
            url,
            from_cache: false,
            cached_at,
        })
    }

    async fn resolve_listing(
        &self,
        request: &ResolutionRequest,
        selection: Selection,
    ) -> Result<Vec<Resolved>, ResolveError> {
        let account = request
            .storage_account
            .as_deref()
            .unwrap_or(&self.storage.default_account);
        let container_url = self
            .store
            .container_url(account, request.artifact_type.as_str());

        // Closest lists the whole major.minor line and compares full versions afterwards
        let version_prefix = match selection {
            Selection::Closest(target) => target.major_minor(),
            _ => request.version.clone(),
        };
        let listing_prefix = Some(version_prefix.as_str()).filter(|p| !p.is_empty());

        let blobs = list_blobs(
            self.store.as_ref(),
            &container_url,
            listing_prefix,
            self.retry,
        )
        .await?;
        let criteria = FilterCriteria {
            artifact_type: request.artifact_type,
            country: &request.country,
            version_prefix: &version_prefix,
            after: request.after,
            before: request.before,
            check_platform: !request.do_not_check_platform,
        };
        let candidates = filter_candidates(&blobs, &criteria, &self.aliases);
        debug!(
            "{} of {} blobs in {} match country '{}'",
            candidates.len(),
            blobs.len(),
            container_url,
            request.country
        );

        Ok(select(candidates, selection)
            .into_iter()
            .filter_map(|blob| {
                let version = blob.artifact()?.version;
                Some(Resolved {
                    url: format!("{}/{}", container_url, blob.name),
                    version,
                })
            })
            .collect())
    }

    /// Daily/Weekly: the latest build of the current major.minor published
    /// before `boundary`, or the first one after it if none was.
    async fn resolve_periodic(
        &self,
        request: &ResolutionRequest,
        boundary: DateTime<Utc>,
    ) -> Result<Vec<Resolved>, ResolveError> {
        let latest_request = ResolutionRequest {
            select: SelectStrategy::Latest,
            ..request.clone()
        };
        let Some(current) = self
            .resolve_listing(&latest_request, Selection::Latest)
            .await?
            .pop()
        else {
            return Ok(Vec::new());
        };
        debug!(
            "select={} boundary {} for version line {}",
            request.select,
            boundary,
            current.version.major_minor()
        );

        let same_line = latest_request.with_version(&current.version.major_minor());
        let before_request = same_line.clone().with_before(boundary);
        let before = self
            .resolve_listing(&before_request, Selection::Latest)
            .await?;
        if !before.is_empty() {
            return Ok(before);
        }

        let after = ResolutionRequest {
            select: SelectStrategy::First,
            ..same_line.with_after(boundary)
        };
        self.resolve_listing(&after, Selection::First).await
    }

    async fn resolve_current(
        &self,
        request: &ResolutionRequest,
    ) -> Result<Vec<Resolved>, ResolveError> {
        let latest = ResolutionRequest {
            artifact_type: ArtifactType::Sandbox,
            select: SelectStrategy::Latest,
            ..request.clone()
        };
        self.resolve_listing(&latest, Selection::Latest).await
    }

    async fn resolve_next(
        &self,
        request: &ResolutionRequest,
    ) -> Result<Vec<Resolved>, ResolveError> {
        let base = ResolutionRequest {
            artifact_type: ArtifactType::Sandbox,
            country: BASE_COUNTRY.to_string(),
            select: SelectStrategy::Latest,
            ..request.clone()
        };
        let current = self
            .resolve_listing(&base, Selection::Latest)
            .await?
            .pop()
            .ok_or_else(|| ResolveError::CurrentVersion(BASE_COUNTRY.to_string()))?;

        let Version { major, minor, .. } = current.version;
        let next = match request.select {
            SelectStrategy::NextMinor if minor < LAST_MINOR => Some((major, minor + 1)),
            _ => major.checked_add(1).map(|next_major| (next_major, 0)),
        }
        .ok_or_else(|| ResolveError::CurrentVersion(current.version.to_string()))?;
        debug!(
            "Current version {}, looking for {}.{} on the insider channel",
            current.version, next.0, next.1
        );

        let country = if request.country.is_empty() {
            FALLBACK_COUNTRY
        } else {
            request.country.as_str()
        };
        let insider = ResolutionRequest {
            artifact_type: ArtifactType::Sandbox,
            country: country.to_string(),
            version: format!("{}.{}.", next.0, next.1),
            select: SelectStrategy::All,
            storage_account: Some(self.storage.insider_account.clone()),
            accept_insider_eula: true,
            ..request.clone()
        };

        Ok(self
            .resolve_listing(&insider, Selection::All)
            .await?
            .pop()
            .into_iter()
            .collect())
    }
}
