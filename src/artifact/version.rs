//! Four-part artifact versions (`major.minor.build.revision`)

use std::fmt;
use std::str::FromStr;

use crate::artifact::error::VersionError;

const COMPONENTS: usize = 4;

/// Artifact version ordered numerically, most significant component first.
///
/// Field order matters: the derived `Ord` compares fields top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parse a version with 1 to 4 components, missing trailing components are 0.
    ///
    /// Examples:
    /// - "24" -> 24.0.0.0
    /// - "24.1" -> 24.1.0.0
    /// - "24.1.18927.19440" -> 24.1.18927.19440
    pub fn parse(version: &str) -> Result<Self, VersionError> {
        let parts = parse_components(version)?;
        if parts.is_empty() || parts.len() > COMPONENTS {
            return Err(VersionError::ComponentCount {
                version: version.to_string(),
                found: parts.len(),
                expected: COMPONENTS,
            });
        }

        let mut components = [0u32; COMPONENTS];
        components[..parts.len()].copy_from_slice(&parts);
        let [major, minor, build, revision] = components;
        Ok(Self::new(major, minor, build, revision))
    }

    /// Parse a version that must carry exactly four components
    pub fn parse_full(version: &str) -> Result<Self, VersionError> {
        let parts = parse_components(version)?;
        match parts.as_slice() {
            [major, minor, build, revision] => Ok(Self::new(*major, *minor, *build, *revision)),
            _ => Err(VersionError::ComponentCount {
                version: version.to_string(),
                found: parts.len(),
                expected: COMPONENTS,
            }),
        }
    }

    /// `major.minor`, the listing prefix used to narrow a closest-match search
    pub fn major_minor(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }
}

fn parse_components(version: &str) -> Result<Vec<u32>, VersionError> {
    version
        .split('.')
        .map(|component| {
            // u32::from_str accepts a leading '+', which is not a version digit
            if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionError::InvalidComponent {
                    version: version.to_string(),
                    component: component.to_string(),
                });
            }
            component
                .parse::<u32>()
                .map_err(|_| VersionError::InvalidComponent {
                    version: version.to_string(),
                    component: component.to_string(),
                })
        })
        .collect()
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// Whether `version` starts with the dotted `prefix`, compared component-wise.
///
/// "24.1" matches "24.1.5.0" but not "24.10.0.0". A trailing dot in the
/// prefix is allowed ("24.1.").
pub fn matches_prefix(version: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('.');
    if prefix.is_empty() {
        return true;
    }
    match version.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}
