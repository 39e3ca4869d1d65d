use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Registry is one of the supported package ecosystems.
///
/// The numeric id doubles as the primary key in the `registries` seed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Registry {
    HuggingFace,
    Docker,
    Maven,
    PyPI,
}

impl Registry {
    pub const ALL: [Registry; 4] = [
        Registry::HuggingFace,
        Registry::Docker,
        Registry::Maven,
        Registry::PyPI,
    ];

    pub const fn id(self) -> i64 {
        match self {
            Self::HuggingFace => 1,
            Self::Docker => 2,
            Self::Maven => 3,
            Self::PyPI => 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::HuggingFace => "HUGGINGFACE",
            Self::Docker => "DOCKER",
            Self::Maven => "MAVEN",
            Self::PyPI => "PYPI",
        }
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Registry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidRegistry(s.to_string()))
    }
}

/// Cascade depth for registry-scoped deletes.
///
/// Ordered so that `Packages < Versions < Artifacts < Signatures`; cleaning at
/// a level removes that level and everything deeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanLevel {
    Packages,
    Versions,
    Artifacts,
    Signatures,
}

impl CleanLevel {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Packages => "packages",
            Self::Versions => "versions",
            Self::Artifacts => "artifacts",
            Self::Signatures => "signatures",
        }
    }
}

impl fmt::Display for CleanLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CleanLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "packages" => Ok(Self::Packages),
            "versions" => Ok(Self::Versions),
            "artifacts" => Ok(Self::Artifacts),
            "signatures" => Ok(Self::Signatures),
            _ => Err(Error::InvalidLevel(s.to_string())),
        }
    }
}

/// Pipeline stage, in conventional execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Packages,
    Filter,
    Adoption,
    Analysis,
}

impl Stage {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Packages => "packages",
            Self::Filter => "filter",
            Self::Adoption => "adoption",
            Self::Analysis => "analysis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "packages" => Ok(Self::Packages),
            "filter" => Ok(Self::Filter),
            "adoption" => Ok(Self::Adoption),
            "analysis" => Ok(Self::Analysis),
            _ => Err(Error::InvalidStage(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_parse_is_case_insensitive() {
        assert_eq!("maven".parse::<Registry>().unwrap(), Registry::Maven);
        assert_eq!("PyPI".parse::<Registry>().unwrap(), Registry::PyPI);
        assert_eq!(
            "HUGGINGFACE".parse::<Registry>().unwrap(),
            Registry::HuggingFace
        );
        assert!(matches!(
            "npm".parse::<Registry>(),
            Err(Error::InvalidRegistry(_))
        ));
    }

    #[test]
    fn test_clean_level_order() {
        assert!(CleanLevel::Packages < CleanLevel::Versions);
        assert!(CleanLevel::Versions < CleanLevel::Artifacts);
        assert!(CleanLevel::Artifacts < CleanLevel::Signatures);
    }
}
