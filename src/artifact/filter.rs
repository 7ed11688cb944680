//! Narrowing of a raw listing down to candidate artifacts

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::artifact::types::{ArtifactName, ArtifactType, BlobEntry};
use crate::artifact::version::matches_prefix;

/// Sandbox localizations that are served by another country's artifact
const BUILTIN_COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("ad", "es"),
    ("ae", "w1"),
    ("ba", "w1"),
    ("bd", "w1"),
    ("br", "w1"),
    ("co", "w1"),
    ("fo", "dk"),
    ("gl", "dk"),
    ("hk", "w1"),
    ("id", "w1"),
    ("kr", "w1"),
    ("li", "ch"),
    ("mc", "fr"),
    ("my", "w1"),
    ("ng", "w1"),
    ("pe", "w1"),
    ("ph", "w1"),
    ("pr", "us"),
    ("qa", "w1"),
    ("sa", "w1"),
    ("sg", "w1"),
    ("sm", "it"),
    ("tw", "w1"),
    ("ua", "w1"),
    ("uk", "gb"),
    ("va", "it"),
    ("za", "w1"),
];

/// Country → artifact locale remapping consulted when a sandbox country has no artifacts of its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryAliases {
    aliases: HashMap<String, String>,
}

impl CountryAliases {
    /// Built-in table extended (or overridden) by `overrides`
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut aliases: HashMap<String, String> = BUILTIN_COUNTRY_ALIASES
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        for (from, to) in overrides {
            aliases.insert(from.to_ascii_lowercase(), to.to_ascii_lowercase());
        }
        Self { aliases }
    }

    pub fn get(&self, country: &str) -> Option<&str> {
        self.aliases
            .get(&country.to_ascii_lowercase())
            .map(String::as_str)
    }
}

impl Default for CountryAliases {
    fn default() -> Self {
        Self::with_overrides(&HashMap::new())
    }
}

/// Criteria applied to a listing before a strategy runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria<'a> {
    pub artifact_type: ArtifactType,
    /// Empty means every locale, but never platform entries
    pub country: &'a str,
    /// Dotted version prefix matched component-wise, empty for none
    pub version_prefix: &'a str,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub check_platform: bool,
}

/// Filter a listing by locale, platform presence, version prefix and date window
pub fn filter_candidates(
    blobs: &[BlobEntry],
    criteria: &FilterCriteria<'_>,
    aliases: &CountryAliases,
) -> Vec<BlobEntry> {
    let prefix = criteria.version_prefix;
    let artifacts: Vec<(&BlobEntry, ArtifactName<'_>)> = blobs
        .iter()
        .filter_map(|blob| blob.artifact().map(|name| (blob, name)))
        .filter(|(_, name)| matches_prefix(name.version_str, prefix))
        .collect();

    let localized: Vec<&(&BlobEntry, ArtifactName<'_>)> = if criteria.country.is_empty() {
        artifacts
            .iter()
            .filter(|(_, name)| !name.is_platform())
            .collect()
    } else {
        select_country(&artifacts, criteria, aliases)
    };

    localized
        .into_iter()
        .filter(|(blob, _)| within_window(blob.last_modified, criteria.after, criteria.before))
        .map(|(blob, _)| (*blob).clone())
        .collect()
}

fn select_country<'s, 'b>(
    artifacts: &'s [(&'b BlobEntry, ArtifactName<'b>)],
    criteria: &FilterCriteria<'_>,
    aliases: &CountryAliases,
) -> Vec<&'s (&'b BlobEntry, ArtifactName<'b>)> {
    let with_locale = |locale: &str| -> Vec<&'s (&'b BlobEntry, ArtifactName<'b>)> {
        artifacts
            .iter()
            .filter(|(_, name)| name.locale.eq_ignore_ascii_case(locale))
            .collect()
    };

    let mut selected = with_locale(criteria.country);
    if selected.is_empty()
        && criteria.artifact_type == ArtifactType::Sandbox
        && let Some(alias) = aliases.get(criteria.country)
        && !alias.eq_ignore_ascii_case(criteria.country)
    {
        debug!(
            "No artifacts for country '{}', remapping to '{}'",
            criteria.country, alias
        );
        selected = with_locale(alias);
    }

    if !criteria.check_platform {
        return selected;
    }

    // Sibling lookup uses the unfiltered listing, not the locale selection
    let published: HashSet<String> = artifacts
        .iter()
        .filter(|(_, name)| name.is_platform())
        .map(|(_, name)| name.version_str.to_string())
        .collect();

    selected
        .into_iter()
        .filter(|(_, name)| published.contains(name.version_str))
        .collect()
}

fn within_window(
    last_modified: DateTime<Utc>,
    after: Option<DateTime<Utc>>,
    before: Option<DateTime<Utc>>,
) -> bool {
    after.is_none_or(|after| last_modified > after)
        && before.is_none_or(|before| last_modified < before)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    fn listing(entries: &[(&str, u32)]) -> Vec<BlobEntry> {
        entries
            .iter()
            .map(|(name, day)| BlobEntry::new(*name, ts(*day)))
            .collect()
    }

    fn names(blobs: &[BlobEntry]) -> Vec<&str> {
        blobs.iter().map(|b| b.name.as_str()).collect()
    }

    fn criteria(country: &str) -> FilterCriteria<'_> {
        FilterCriteria {
            country,
            check_platform: true,
            ..Default::default()
        }
    }

    #[test]
    fn country_filter_requires_platform_sibling() {
        let blobs = listing(&[
            ("14.0.0.0/de", 1),
            ("14.0.0.0/platform", 1),
            ("15.0.0.0/de", 2),
            ("15.1.2.3/DE", 3),
            ("15.1.2.3/platform", 3),
        ]);

        let result = filter_candidates(&blobs, &criteria("de"), &CountryAliases::default());

        assert_eq!(names(&result), vec!["14.0.0.0/de", "15.1.2.3/DE"]);
    }

    #[test]
    fn do_not_check_platform_keeps_unpublished_versions() {
        let blobs = listing(&[("15.0.0.0/de", 2), ("15.1.2.3/platform", 3)]);
        let criteria = FilterCriteria {
            check_platform: false,
            ..criteria("de")
        };

        let result = filter_candidates(&blobs, &criteria, &CountryAliases::default());

        assert_eq!(names(&result), vec!["15.0.0.0/de"]);
    }

    #[test]
    fn empty_country_drops_platform_entries() {
        let blobs = listing(&[
            ("14.0.0.0/de", 1),
            ("14.0.0.0/platform", 1),
            ("14.0.0.0/w1", 1),
        ]);

        let result = filter_candidates(&blobs, &criteria(""), &CountryAliases::default());

        assert_eq!(names(&result), vec!["14.0.0.0/de", "14.0.0.0/w1"]);
    }

    #[test]
    fn sandbox_country_without_artifacts_is_remapped() {
        let blobs = listing(&[("24.0.0.0/w1", 1), ("24.0.0.0/platform", 1)]);

        let result = filter_candidates(&blobs, &criteria("ZA"), &CountryAliases::default());

        assert_eq!(names(&result), vec!["24.0.0.0/w1"]);
    }

    #[test]
    fn onprem_country_is_not_remapped() {
        let blobs = listing(&[("24.0.0.0/w1", 1), ("24.0.0.0/platform", 1)]);
        let criteria = FilterCriteria {
            artifact_type: ArtifactType::OnPrem,
            ..criteria("za")
        };

        let result = filter_candidates(&blobs, &criteria, &CountryAliases::default());

        assert!(result.is_empty());
    }

    #[test]
    fn remap_is_skipped_when_country_has_artifacts() {
        let blobs = listing(&[
            ("24.0.0.0/za", 1),
            ("24.0.0.0/w1", 1),
            ("24.0.0.0/platform", 1),
        ]);

        let result = filter_candidates(&blobs, &criteria("za"), &CountryAliases::default());

        assert_eq!(names(&result), vec!["24.0.0.0/za"]);
    }

    #[test]
    fn configured_alias_overrides_builtin_table() {
        let aliases =
            CountryAliases::with_overrides(&HashMap::from([("ZA".to_string(), "GB".to_string())]));
        let blobs = listing(&[
            ("24.0.0.0/w1", 1),
            ("24.0.0.0/gb", 1),
            ("24.0.0.0/platform", 1),
        ]);

        let result = filter_candidates(&blobs, &criteria("za"), &aliases);

        assert_eq!(names(&result), vec!["24.0.0.0/gb"]);
    }

    #[rstest]
    #[case(Some(4), None, vec!["2.0.0.0/w1", "3.0.0.0/w1"])]
    #[case(None, Some(9), vec!["1.0.0.0/w1", "2.0.0.0/w1"])]
    #[case(Some(1), Some(9), vec!["2.0.0.0/w1"])]
    #[case(Some(9), None, vec![])]
    fn date_window_is_exclusive(
        #[case] after_day: Option<u32>,
        #[case] before_day: Option<u32>,
        #[case] expected: Vec<&str>,
    ) {
        let blobs = listing(&[("1.0.0.0/w1", 1), ("2.0.0.0/w1", 5), ("3.0.0.0/w1", 9)]);
        let criteria = FilterCriteria {
            after: after_day.map(ts),
            before: before_day.map(ts),
            ..criteria("")
        };

        let result = filter_candidates(&blobs, &criteria, &CountryAliases::default());

        assert_eq!(names(&result), expected);
    }

    #[test]
    fn version_prefix_matches_whole_components() {
        let blobs = listing(&[("24.1.5.0/w1", 1), ("24.10.0.0/w1", 1), ("24.1.7.0/w1", 1)]);
        let criteria = FilterCriteria {
            version_prefix: "24.1",
            ..criteria("")
        };

        let result = filter_candidates(&blobs, &criteria, &CountryAliases::default());

        assert_eq!(names(&result), vec!["24.1.5.0/w1", "24.1.7.0/w1"]);
    }

    #[test]
    fn unparsable_names_are_ignored() {
        let blobs = listing(&[("readme.txt", 1), ("24.0.0.0/w1", 1), ("beta/w1", 1)]);

        let result = filter_candidates(&blobs, &criteria(""), &CountryAliases::default());

        assert_eq!(names(&result), vec!["24.0.0.0/w1"]);
    }
}
