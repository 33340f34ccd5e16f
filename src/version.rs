//! Server version handling and the strategy table for version-gated features.

use semver::{Comparator, Op, Prerelease, Version, VersionReq};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter};

use crate::error::MwdbError;

/// MWDB server version.
///
/// Only the leading `MAJOR.MINOR.PATCH` is significant; suffixes such as
/// `-rc1` or `.dev0` are ignored.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerVersion(Version);

impl ServerVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        ServerVersion(Version::new(major, minor, patch))
    }

    pub fn as_semver(&self) -> &Version {
        &self.0
    }
}

impl FromStr for ServerVersion {
    type Err = MwdbError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || MwdbError::BadResponse(format!("invalid server version '{}'", value));

        let mut numbers = value.trim().splitn(3, '.');
        let mut component = |last: bool| -> Result<u64, MwdbError> {
            let raw = numbers.next().ok_or_else(invalid)?;
            let digits: &str = if last {
                let end = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
                &raw[..end]
            } else {
                raw
            };
            digits.parse::<u64>().map_err(|_| invalid())
        };

        let major = component(false)?;
        let minor = component(false)?;
        let patch = component(true)?;
        Ok(ServerVersion::new(major, minor, patch))
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operations whose endpoint changed between server releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum Feature {
    #[strum(serialize = "file download")]
    FileDownload,
    #[strum(serialize = "attributes")]
    Attributes,
    #[strum(serialize = "karton analyses")]
    KartonAnalyses,
}

/// Which implementation of a feature to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Current,
    Legacy,
}

/// Version ranges supported by each strategy of a feature
#[derive(Debug, Clone)]
pub struct Gate {
    pub current: VersionReq,
    pub legacy: Option<VersionReq>,
}

fn at_least(major: u64, minor: u64, patch: u64) -> VersionReq {
    VersionReq {
        comparators: vec![Comparator {
            op: Op::GreaterEq,
            major,
            minor: Some(minor),
            patch: Some(patch),
            pre: Prerelease::EMPTY,
        }],
    }
}

impl Feature {
    pub fn gate(&self) -> Gate {
        match self {
            Feature::FileDownload => Gate {
                current: at_least(2, 2, 0),
                legacy: Some(at_least(2, 0, 0)),
            },
            Feature::Attributes => Gate {
                current: at_least(2, 6, 0),
                legacy: Some(at_least(2, 0, 0)),
            },
            Feature::KartonAnalyses => Gate {
                current: at_least(2, 3, 0),
                legacy: None,
            },
        }
    }
}

impl Gate {
    pub fn supports_current(&self, version: &ServerVersion) -> bool {
        self.current.matches(version.as_semver())
    }

    pub fn supports_legacy(&self, version: &ServerVersion) -> bool {
        self.legacy
            .as_ref()
            .map(|req| req.matches(version.as_semver()))
            .unwrap_or(false)
    }

    /// Lowest version able to run this feature in any form
    pub fn minimum(&self) -> String {
        self.legacy.as_ref().unwrap_or(&self.current).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_parse_ignores_suffix() {
        assert_eq!("2.9.0".parse::<ServerVersion>().unwrap(), ServerVersion::new(2, 9, 0));
        assert_eq!("2.10.1-rc1".parse::<ServerVersion>().unwrap(), ServerVersion::new(2, 10, 1));
        assert_eq!("2.6.0.dev3".parse::<ServerVersion>().unwrap(), ServerVersion::new(2, 6, 0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for value in ["", "2", "2.x.1", "v2.1.0", "2.1.rc"] {
            assert!(value.parse::<ServerVersion>().is_err(), "{value}");
        }
    }

    #[test]
    fn test_versions_compare_numerically() {
        assert!(ServerVersion::new(2, 10, 0) > ServerVersion::new(2, 9, 9));
    }

    #[test]
    fn test_gates() {
        let attributes = Feature::Attributes.gate();
        assert!(attributes.supports_current(&ServerVersion::new(2, 6, 0)));
        assert!(!attributes.supports_current(&ServerVersion::new(2, 5, 9)));
        assert!(attributes.supports_legacy(&ServerVersion::new(2, 5, 9)));

        let karton = Feature::KartonAnalyses.gate();
        assert!(!karton.supports_legacy(&ServerVersion::new(2, 2, 0)));
        assert_eq!(karton.minimum(), ">=2.3.0");
    }

    #[test]
    fn test_every_feature_has_a_current_requirement() {
        for feature in Feature::iter() {
            assert!(feature.gate().supports_current(&ServerVersion::new(99, 0, 0)));
        }
    }
}
