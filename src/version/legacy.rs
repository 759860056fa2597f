//! Legacy series to release identifier mapping
//!
//! Older agents identify their platform by distribution series ("trusty",
//! "bionic", "win2012r2", ...). Newer agents and the store use the OS type
//! name ("ubuntu", "windows", ...). The table is built once and never
//! mutated; callers share it behind an `Arc`.

use std::collections::{BTreeMap, HashMap, HashSet};

/// Canonical release identifiers (OS type names)
pub const CANONICAL_RELEASES: [&str; 7] = [
    "ubuntu",
    "centos",
    "opensuse",
    "windows",
    "osx",
    "genericlinux",
    "kubernetes",
];

const UBUNTU_SERIES: [&str; 22] = [
    "precise", "quantal", "raring", "saucy", "trusty", "utopic", "vivid", "wily", "xenial",
    "yakkety", "zesty", "artful", "bionic", "cosmic", "disco", "eoan", "focal", "groovy",
    "hirsute", "impish", "jammy", "kinetic",
];

const WINDOWS_SERIES: [&str; 13] = [
    "win2008r2",
    "win2012hvr2",
    "win2012hv",
    "win2012r2",
    "win2012",
    "win2016",
    "win2016hv",
    "win2016nano",
    "win2019",
    "win7",
    "win8",
    "win81",
    "win10",
];

/// Immutable mapping from legacy series names to canonical release identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyReleaseMap {
    series: HashMap<String, String>,
    releases: HashSet<String>,
}

impl LegacyReleaseMap {
    /// Build a map from explicit (series, release) pairs.
    ///
    /// Every mapped release is treated as canonical in addition to the
    /// built-in [`CANONICAL_RELEASES`].
    pub fn new<I, S, R>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, R)>,
        S: Into<String>,
        R: Into<String>,
    {
        let mut releases: HashSet<String> =
            CANONICAL_RELEASES.iter().map(|r| r.to_string()).collect();
        let mut series = HashMap::new();
        for (name, release) in pairs {
            let release = release.into().to_lowercase();
            releases.insert(release.clone());
            series.insert(name.into().to_lowercase(), release);
        }
        Self { series, releases }
    }

    /// The series table shipped with the service
    pub fn builtin() -> Self {
        let mut pairs: Vec<(&str, &str)> = Vec::new();
        pairs.extend(UBUNTU_SERIES.iter().map(|s| (*s, "ubuntu")));
        pairs.extend(WINDOWS_SERIES.iter().map(|s| (*s, "windows")));
        pairs.extend([
            ("centos7", "centos"),
            ("centos8", "centos"),
            ("centos9", "centos"),
            ("opensuseleap", "opensuse"),
            ("genericlinux", "genericlinux"),
            ("kubernetes", "kubernetes"),
        ]);
        Self::new(pairs)
    }

    /// Built-in table with configured entries layered on top
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut map = Self::builtin();
        for (name, release) in overrides {
            let release = release.to_lowercase();
            map.releases.insert(release.clone());
            map.series.insert(name.to_lowercase(), release);
        }
        map
    }

    /// True if `name` is already a canonical release identifier
    pub fn is_release(&self, name: &str) -> bool {
        self.releases.contains(name)
    }

    /// True if `name` is a known legacy series
    pub fn is_series(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    pub fn release_for_series(&self, series: &str) -> Option<&str> {
        self.series.get(series).map(String::as_str)
    }

    /// Normalize a release identifier.
    ///
    /// Canonical names are returned unchanged, known series map to their
    /// release, and anything else is returned as-is.
    pub fn normalize<'a>(&'a self, name: &'a str) -> &'a str {
        if self.is_release(name) {
            return name;
        }
        self.release_for_series(name).unwrap_or(name)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl Default for LegacyReleaseMap {
    fn default() -> Self {
        Self::builtin()
    }
}
