//! Common types for artifact resolution

use std::fmt;

use chrono::{DateTime, Utc};

use crate::artifact::error::RequestError;
use crate::artifact::version::Version;

/// Suffix marking the platform entry of a release
pub const PLATFORM: &str = "platform";

/// Kind of artifact, which is also the container name in the blob store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArtifactType {
    /// Cloud sandbox artifacts
    #[default]
    Sandbox,
    /// On-premises artifacts
    OnPrem,
}

impl ArtifactType {
    /// Container name holding artifacts of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::Sandbox => "sandbox",
            ArtifactType::OnPrem => "onprem",
        }
    }
}

impl std::str::FromStr for ArtifactType {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sandbox" => Ok(ArtifactType::Sandbox),
            "onprem" => Ok(ArtifactType::OnPrem),
            _ => Err(RequestError::UnknownType(s.to_string())),
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a set of candidates is reduced to the requested artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SelectStrategy {
    /// Every match, ascending by version
    All,
    /// Highest version
    #[default]
    Latest,
    /// Lowest version
    First,
    /// Lowest version greater than or equal to the requested one
    Closest,
    /// Newest release of the second-newest major line
    SecondToLastMajor,
    /// Latest build as of the start of today
    Daily,
    /// Latest build as of the start of the current week
    Weekly,
    /// Latest public sandbox build
    Current,
    /// Newest insider build of the next minor release
    NextMinor,
    /// Newest insider build of the next major release
    NextMajor,
}

impl SelectStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectStrategy::All => "All",
            SelectStrategy::Latest => "Latest",
            SelectStrategy::First => "First",
            SelectStrategy::Closest => "Closest",
            SelectStrategy::SecondToLastMajor => "SecondToLastMajor",
            SelectStrategy::Daily => "Daily",
            SelectStrategy::Weekly => "Weekly",
            SelectStrategy::Current => "Current",
            SelectStrategy::NextMinor => "NextMinor",
            SelectStrategy::NextMajor => "NextMajor",
        }
    }

    /// Whether the strategy is answered by sub-resolutions instead of a listing
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            SelectStrategy::Daily
                | SelectStrategy::Weekly
                | SelectStrategy::Current
                | SelectStrategy::NextMinor
                | SelectStrategy::NextMajor
        )
    }
}

impl std::str::FromStr for SelectStrategy {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(SelectStrategy::All),
            "latest" => Ok(SelectStrategy::Latest),
            "first" => Ok(SelectStrategy::First),
            "closest" => Ok(SelectStrategy::Closest),
            "secondtolastmajor" => Ok(SelectStrategy::SecondToLastMajor),
            "daily" => Ok(SelectStrategy::Daily),
            "weekly" => Ok(SelectStrategy::Weekly),
            "current" => Ok(SelectStrategy::Current),
            "nextminor" => Ok(SelectStrategy::NextMinor),
            "nextmajor" => Ok(SelectStrategy::NextMajor),
            _ => Err(RequestError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for SelectStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A blob as returned by the listing endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    /// Blob name, e.g. "24.1.18927.19440/de"
    pub name: String,
    /// Last-Modified property of the blob
    pub last_modified: DateTime<Utc>,
}

impl BlobEntry {
    pub fn new(name: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            last_modified,
        }
    }

    /// Split the blob name into its artifact parts
    pub fn artifact(&self) -> Option<ArtifactName<'_>> {
        ArtifactName::parse(&self.name)
    }
}

/// Borrowed view of a `<version>/<locale-or-platform>` blob name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactName<'a> {
    pub version_str: &'a str,
    pub version: Version,
    pub locale: &'a str,
}

impl<'a> ArtifactName<'a> {
    /// Returns None for names that are not `<version>/<segment>` with a parsable version
    pub fn parse(name: &'a str) -> Option<Self> {
        let (version_str, locale) = name.split_once('/')?;
        if locale.is_empty() || locale.contains('/') {
            return None;
        }
        let version = Version::parse(version_str).ok()?;
        Some(Self {
            version_str,
            version,
            locale,
        })
    }

    pub fn is_platform(&self) -> bool {
        self.locale.eq_ignore_ascii_case(PLATFORM)
    }
}
