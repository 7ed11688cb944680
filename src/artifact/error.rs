use thiserror::Error;

use crate::artifact::types::SelectStrategy;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Invalid version component '{component}' in '{version}'")]
    InvalidComponent { version: String, component: String },

    #[error("Version '{version}' has {found} components, expected {expected}")]
    ComponentCount {
        version: String,
        found: usize,
        expected: usize,
    },
}

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid listing URL: {0}")]
    InvalidUrl(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid listing response: {0}")]
    InvalidResponse(String),

    #[error("Listing returned already visited marker {0:?}")]
    Stalled(Option<String>),

    #[error("Listing page {marker:?} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        marker: Option<String>,
        attempts: u32,
        last_error: Box<ListingError>,
    },
}

impl ListingError {
    /// Whether the same page may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        match self {
            ListingError::Network(_) | ListingError::InvalidResponse(_) => true,
            ListingError::Status { status, .. } => *status == 429 || *status >= 500,
            ListingError::InvalidUrl(_)
            | ListingError::ContainerNotFound(_)
            | ListingError::Stalled(_)
            | ListingError::RetriesExhausted { .. } => false,
        }
    }
}

/// Violations detected before any remote call is made
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Parameter '{parameter}' cannot be combined with select={strategy}")]
    ForbiddenParameter {
        strategy: SelectStrategy,
        parameter: &'static str,
    },

    #[error("select={0} is not supported for OnPrem artifacts")]
    OnPremNotSupported(SelectStrategy),

    #[error("select=Closest requires a version in the format 1.2.3.4")]
    ClosestRequiresVersion,

    #[error(transparent)]
    InvalidVersion(#[from] VersionError),

    #[error("Invalid country code '{0}'")]
    InvalidCountry(String),

    #[error("Unknown artifact type '{0}'")]
    UnknownType(String),

    #[error("Unknown select strategy '{0}'")]
    UnknownStrategy(String),

    #[error("Access to insider builds requires accepting the insider EULA")]
    InsiderEulaRequired,

    #[error("Cache expiration must be at least {minimum} seconds, got {seconds}")]
    ExpirationTooShort { seconds: u64, minimum: u64 },
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error("Unable to determine current version from '{0}'")]
    CurrentVersion(String),
}
