use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Outcome of verifying one artifact's signature.
///
/// Exactly one status is recorded per checked artifact. The numeric id is the
/// primary key in the `sig_status` seed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureStatus {
    Good,
    NoSig,
    BadSig,
    ExpSig,
    ExpPub,
    NoPub,
    RevPub,
    BadPub,
    Other,
}

impl SignatureStatus {
    pub const ALL: [SignatureStatus; 9] = [
        SignatureStatus::Good,
        SignatureStatus::NoSig,
        SignatureStatus::BadSig,
        SignatureStatus::ExpSig,
        SignatureStatus::ExpPub,
        SignatureStatus::NoPub,
        SignatureStatus::RevPub,
        SignatureStatus::BadPub,
        SignatureStatus::Other,
    ];

    pub const fn id(self) -> i64 {
        match self {
            Self::Good => 1,
            Self::NoSig => 2,
            Self::BadSig => 3,
            Self::ExpSig => 4,
            Self::ExpPub => 5,
            Self::NoPub => 6,
            Self::RevPub => 7,
            Self::BadPub => 8,
            Self::Other => 9,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Good => "GOOD",
            Self::NoSig => "NO_SIG",
            Self::BadSig => "BAD_SIG",
            Self::ExpSig => "EXP_SIG",
            Self::ExpPub => "EXP_PUB",
            Self::NoPub => "NO_PUB",
            Self::RevPub => "REV_PUB",
            Self::BadPub => "BAD_PUB",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of signature attached to an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureType {
    /// Detached OpenPGP signature.
    Pgp,
    /// Docker content trust.
    Dct,
    /// Git commit signature.
    Gcs,
}

impl SignatureType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pgp => "pgp",
            Self::Dct => "dct",
            Self::Gcs => "gcs",
        }
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SignatureType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pgp" => Ok(Self::Pgp),
            "dct" => Ok(Self::Dct),
            "gcs" => Ok(Self::Gcs),
            other => Err(Error::Config(format!("unknown signature type: {other}"))),
        }
    }
}
