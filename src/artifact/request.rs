//! Typed resolution request and its validation rules

use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

use crate::artifact::error::RequestError;
use crate::artifact::types::{ArtifactType, SelectStrategy};
use crate::artifact::version::Version;

/// A logical artifact request, e.g. "latest sandbox artifact for de"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub artifact_type: ArtifactType,
    /// Locale code, empty for every locale
    pub country: String,
    /// Dotted version prefix, or the full target version for Closest
    pub version: String,
    pub select: SelectStrategy,
    /// Only artifacts modified strictly after this instant
    pub after: Option<DateTime<Utc>>,
    /// Only artifacts modified strictly before this instant
    pub before: Option<DateTime<Utc>>,
    /// Storage account to list, None for the configured default
    pub storage_account: Option<String>,
    pub accept_insider_eula: bool,
    pub do_not_check_platform: bool,
}

impl ResolutionRequest {
    pub fn new(artifact_type: ArtifactType, country: &str, select: SelectStrategy) -> Self {
        Self {
            artifact_type,
            country: country.trim().to_string(),
            select,
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.trim().to_string();
        self
    }

    pub fn with_after(mut self, after: DateTime<Utc>) -> Self {
        self.after = Some(after);
        self
    }

    pub fn with_before(mut self, before: DateTime<Utc>) -> Self {
        self.before = Some(before);
        self
    }

    pub fn with_storage_account(mut self, account: &str) -> Self {
        let account = account.trim();
        self.storage_account = (!account.is_empty()).then(|| account.to_string());
        self
    }

    pub fn accept_insider_eula(mut self, accept: bool) -> Self {
        self.accept_insider_eula = accept;
        self
    }

    pub fn do_not_check_platform(mut self, skip: bool) -> Self {
        self.do_not_check_platform = skip;
        self
    }

    /// Check the request against the per-strategy parameter rules.
    ///
    /// `insider_account` is the EULA-gated storage account; listing it
    /// directly requires the same acceptance as NextMinor/NextMajor.
    pub fn validate(&self, insider_account: &str) -> Result<(), RequestError> {
        if !self.country.is_empty() && !is_valid_country(&self.country) {
            return Err(RequestError::InvalidCountry(self.country.clone()));
        }

        let forbid = |present: bool, parameter: &'static str| {
            if present {
                Err(RequestError::ForbiddenParameter {
                    strategy: self.select,
                    parameter,
                })
            } else {
                Ok(())
            }
        };

        match self.select {
            SelectStrategy::Daily | SelectStrategy::Weekly => {
                forbid(!self.version.is_empty(), "version")?;
                forbid(self.after.is_some(), "after")?;
                forbid(self.before.is_some(), "before")?;
            }
            SelectStrategy::Current | SelectStrategy::NextMinor | SelectStrategy::NextMajor => {
                forbid(self.storage_account.is_some(), "storageAccount")?;
                if self.artifact_type == ArtifactType::OnPrem {
                    return Err(RequestError::OnPremNotSupported(self.select));
                }
                forbid(!self.version.is_empty(), "version")?;
                if self.select != SelectStrategy::Current && !self.accept_insider_eula {
                    return Err(RequestError::InsiderEulaRequired);
                }
            }
            SelectStrategy::Closest => {
                if self.version.is_empty() {
                    return Err(RequestError::ClosestRequiresVersion);
                }
                Version::parse_full(&self.version)?;
            }
            SelectStrategy::SecondToLastMajor => {
                forbid(!self.version.is_empty(), "version")?;
            }
            SelectStrategy::All | SelectStrategy::Latest | SelectStrategy::First => {
                if !self.version.is_empty() {
                    Version::parse(self.version.trim_end_matches('.'))?;
                }
            }
        }

        if let Some(account) = &self.storage_account
            && account.eq_ignore_ascii_case(insider_account)
            && !self.accept_insider_eula
        {
            return Err(RequestError::InsiderEulaRequired);
        }

        Ok(())
    }

    /// Cache key built from every non-default field in a fixed order.
    ///
    /// The key is lowercased so requests differing only in casing share an entry.
    pub fn signature(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if self.artifact_type != ArtifactType::default() {
            parts.push(format!("type={}", self.artifact_type));
        }
        if !self.country.is_empty() {
            parts.push(format!("country={}", self.country));
        }
        if !self.version.is_empty() {
            parts.push(format!("version={}", self.version));
        }
        if self.select != SelectStrategy::default() {
            parts.push(format!("select={}", self.select));
        }
        if let Some(after) = self.after {
            parts.push(format!("after={}", format_instant(after)));
        }
        if let Some(before) = self.before {
            parts.push(format!("before={}", format_instant(before)));
        }
        if let Some(account) = &self.storage_account {
            parts.push(format!("storageaccount={}", account));
        }
        if self.accept_insider_eula {
            parts.push("acceptinsidereula=true".to_string());
        }
        if self.do_not_check_platform {
            parts.push("donotcheckplatform=true".to_string());
        }
        parts.join("&").to_lowercase()
    }
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn country_regex() -> Regex {
    Regex::new(r"^[a-z0-9]{2,4}$").expect("valid regex")
}

fn is_valid_country(country: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(country_regex);
    re.is_match(&country.to_ascii_lowercase())
}
