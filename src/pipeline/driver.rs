use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{CleanLevel, NewPackage, Package, Registry, Version};
use crate::verify::{SignatureChecker, SignatureEvidence};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionListing {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

/// One artifact found for a version, with whatever signature evidence the
/// driver collected for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReport {
    pub name: String,
    pub kind: String,
    pub digest: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub extensions: Vec<String>,
    pub signature: Option<SignatureEvidence>,
}

/// Registry-specific source of packages, versions, and artifacts.
///
/// Drivers talk to the outside world; the controller owns batching and
/// persistence.
pub trait RegistryDriver {
    fn registry(&self) -> Registry;

    /// Every package the registry lists, in a stable order.
    fn list_packages(&self) -> Result<Vec<NewPackage>>;

    /// Versions worth examining for `package`, or `None` to filter it out.
    fn select_versions(&self, package: &Package) -> Result<Option<Vec<VersionListing>>>;

    /// Artifacts of one version. The outer error fails the whole version;
    /// inner errors only skip the artifact.
    fn collect_artifacts(
        &self,
        package: &Package,
        version: &Version,
        checker: &dyn SignatureChecker,
    ) -> Result<Vec<Result<ArtifactReport>>>;

    /// Level cleaned before an adoption run. Drivers that only refresh
    /// signature data keep previously discovered artifacts.
    fn adoption_clean_level(&self) -> CleanLevel {
        CleanLevel::Artifacts
    }
}
