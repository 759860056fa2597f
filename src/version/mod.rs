//! Agent binary version keys
//!
//! A [`VersionKey`] identifies one agent binary artifact: the version number,
//! the release identifier (an OS type such as `ubuntu`, or a legacy series
//! name such as `trusty`) and the CPU architecture.
//!
//! The canonical string form is `<number>-<release>-<arch>`, where the
//! number is one of:
//!
//! - `2.9.0` (major.minor.patch)
//! - `2.9.0.1` (with a non-zero build component)
//! - `2.9-beta1` (pre-release tag followed by the patch number)
//!
//! Two keys are cache-equal iff their canonical strings are byte-equal.

pub mod legacy;

pub use legacy::LegacyReleaseMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::constants::{LEGACY_WINDOW_MAJOR, LEGACY_WINDOW_MAX_MINOR};

/// Errors produced while parsing version strings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("invalid binary version {0:?}")]
    InvalidFormat(String),

    #[error("invalid version number {0:?}")]
    InvalidNumber(String),

    #[error("unknown architecture {0:?}")]
    UnknownArch(String),

    #[error("invalid release identifier {0:?}")]
    InvalidRelease(String),
}

fn binary_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{1,9})\.(\d{1,9})(?:\.|-([a-z]+))(\d{1,9})(?:\.(\d{1,9}))?-([^-]+)-([^-]+)$")
            .expect("binary version pattern is valid")
    })
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{1,9})\.(\d{1,9})(?:\.|-([a-z]+))(\d{1,9})(?:\.(\d{1,9}))?$")
            .expect("version number pattern is valid")
    })
}

/// A version number: major.minor.patch with optional tag and build
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Number {
    pub major: u32,
    pub minor: u32,
    /// Pre-release tag (e.g. "beta"); empty for final releases
    pub tag: String,
    pub patch: u32,
    pub build: u32,
}

impl Number {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            tag: String::new(),
            patch,
            build: 0,
        }
    }

    /// True when this number falls inside the legacy series compatibility window
    pub fn in_legacy_window(&self) -> bool {
        self.major == LEGACY_WINDOW_MAJOR && self.minor <= LEGACY_WINDOW_MAX_MINOR
    }

    fn from_captures(
        major: &str,
        minor: &str,
        tag: Option<&str>,
        patch: &str,
        build: Option<&str>,
        original: &str,
    ) -> Result<Self, VersionParseError> {
        let parse = |s: &str| {
            s.parse::<u32>()
                .map_err(|_| VersionParseError::InvalidNumber(original.to_string()))
        };
        Ok(Self {
            major: parse(major)?,
            minor: parse(minor)?,
            tag: tag.unwrap_or_default().to_string(),
            patch: parse(patch)?,
            build: build.map(parse).transpose()?.unwrap_or(0),
        })
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.is_empty() {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        } else {
            write!(f, "{}.{}-{}{}", self.major, self.minor, self.tag, self.patch)?;
        }
        if self.build > 0 {
            write!(f, ".{}", self.build)?;
        }
        Ok(())
    }
}

impl FromStr for Number {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = number_pattern()
            .captures(s)
            .ok_or_else(|| VersionParseError::InvalidNumber(s.to_string()))?;
        Number::from_captures(
            &caps[1],
            &caps[2],
            caps.get(3).map(|m| m.as_str()),
            &caps[4],
            caps.get(5).map(|m| m.as_str()),
            s,
        )
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then_with(|| match (self.tag.is_empty(), other.tag.is_empty()) {
                // Tagged pre-releases sort before the final release
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => self.tag.cmp(&other.tag),
            })
            .then(self.patch.cmp(&other.patch))
            .then(self.build.cmp(&other.build))
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// CPU architectures agent binaries are built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arch {
    Amd64,
    I386,
    Armel,
    Armhf,
    Arm64,
    Ppc64el,
    S390x,
    Riscv64,
}

impl Arch {
    pub const ALL: [Arch; 8] = [
        Arch::Amd64,
        Arch::I386,
        Arch::Armel,
        Arch::Armhf,
        Arch::Arm64,
        Arch::Ppc64el,
        Arch::S390x,
        Arch::Riscv64,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::I386 => "i386",
            Arch::Armel => "armel",
            Arch::Armhf => "armhf",
            Arch::Arm64 => "arm64",
            Arch::Ppc64el => "ppc64el",
            Arch::S390x => "s390x",
            Arch::Riscv64 => "riscv64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arch::ALL
            .iter()
            .copied()
            .find(|arch| arch.as_str() == s)
            .ok_or_else(|| VersionParseError::UnknownArch(s.to_string()))
    }
}

/// A fully qualified agent binary version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionKey {
    pub number: Number,
    pub release: String,
    pub arch: Arch,
}

impl VersionKey {
    pub fn new(number: Number, release: impl Into<String>, arch: Arch) -> Self {
        Self {
            number,
            release: release.into(),
            arch,
        }
    }

    /// Parse the canonical string form `<number>-<release>-<arch>`
    pub fn parse(s: &str) -> Result<Self, VersionParseError> {
        let caps = binary_pattern()
            .captures(s)
            .ok_or_else(|| VersionParseError::InvalidFormat(s.to_string()))?;

        let number = Number::from_captures(
            &caps[1],
            &caps[2],
            caps.get(3).map(|m| m.as_str()),
            &caps[4],
            caps.get(5).map(|m| m.as_str()),
            s,
        )?;

        let release = &caps[6];
        if !release
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(VersionParseError::InvalidRelease(release.to_string()));
        }

        let arch = caps[7].parse::<Arch>()?;

        Ok(Self {
            number,
            release: release.to_string(),
            arch,
        })
    }

    pub fn in_legacy_window(&self) -> bool {
        self.number.in_legacy_window()
    }

    /// Copy of this key with a different release identifier
    pub fn with_release(&self, release: impl Into<String>) -> Self {
        Self {
            number: self.number.clone(),
            release: release.into(),
            arch: self.arch,
        }
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.number, self.release, self.arch)
    }
}

impl FromStr for VersionKey {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionKey::parse(s)
    }
}

impl Serialize for VersionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        VersionKey::parse(&s).map_err(serde::de::Error::custom)
    }
}
