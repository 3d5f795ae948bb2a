//! ---
//! lk_section: "01-core-model"
//! lk_subsection: "module"
//! lk_type: "source"
//! lk_scope: "code"
//! lk_description: "Three-part component version with best-effort parsing."
//! lk_version: "v0.1.0-alpha"
//! lk_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;

use serde::de::{Deserializer, Error as _};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Immutable three-part component version ordered as a (major, minor, patch)
/// tuple.
///
/// The derived `Ord` compares field by field in declaration order, which is
/// exactly the tuple comparison the updater's version gate relies on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// Major version component.
    pub major: u32,
    /// Minor version component.
    pub minor: u32,
    /// Patch version component.
    pub patch: u32,
}

impl Version {
    /// The "never installed" baseline. Every published version compares
    /// strictly greater, which makes unseen components eligible for their
    /// initial install.
    pub const ZERO: Version = Version {
        major: 0,
        minor: 0,
        patch: 0,
    };

    /// Construct a version from its three components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Best-effort parse that never fails.
    ///
    /// Everything except ASCII digits and `.` is stripped, the remainder is
    /// split on `.`, and any missing or unparseable segment defaults to 0. A
    /// string with no digits at all parses to `0.0.0`. A corrupt or missing
    /// version string must not abort an update run, so there is no error
    /// path here.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let cleaned: String = text
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let mut segments = cleaned.split('.');
        let mut next = || {
            segments
                .next()
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(0)
        };
        Self {
            major: next(),
            minor: next(),
            patch: next(),
        }
    }
}

impl fmt::Display for Version {
    /// Canonical `V{major}.{minor}.{patch}` form; round-trips through
    /// [`Version::parse`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Version::parse(s))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(text) => Ok(Version::parse(&text)),
            // Feeds that emit versions as bare numbers (`"version": 1.2`)
            // still go through the best-effort parse of the rendered form.
            serde_json::Value::Number(number) => Ok(Version::parse(&number.to_string())),
            other => Err(D::Error::custom(format!(
                "expected version string or number, found {other}"
            ))),
        }
    }
}
