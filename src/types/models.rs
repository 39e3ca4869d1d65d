use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Registry, SignatureStatus, SignatureType};
use crate::verify::PacketMetadata;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPackage {
    pub registry: Registry,
    pub name: String,
    pub versions_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_release_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_release_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<i64>,
    /// Window the download counter covers, e.g. "last_month". Registries differ.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads_period: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: i64,
    pub registry: Registry,
    pub name: String,
    pub versions_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_release_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_release_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads_period: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVersion {
    pub package_id: i64,
    pub name: String,
    /// Some registries timestamp artifacts rather than versions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub id: i64,
    pub package_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArtifact {
    pub version_id: i64,
    pub name: String,
    /// Free-form type tag such as "file", "tag" or "commit".
    pub kind: String,
    pub has_sig: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSignature {
    pub artifact_id: i64,
    pub kind: SignatureType,
    pub raw: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSigCheck {
    pub artifact_id: i64,
    pub status: SignatureStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewListPacket {
    pub signature_id: i64,
    pub metadata: PacketMetadata,
    pub raw: String,
}

/// Cached key lookup. `keyserver` is "local" when the keyring already had it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PgpKey {
    pub key_id: String,
    pub keyserver: String,
    pub raw: String,
}
