//! File-backed registry driver.
//!
//! A manifest is a JSON snapshot of what a registry crawler found: packages,
//! their versions, and each version's artifacts. Artifacts point at local
//! files (and detached `.asc` signatures) relative to the manifest, or carry
//! transcripts captured elsewhere for signature kinds gpg cannot check.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::driver::{ArtifactReport, RegistryDriver, VersionListing};
use crate::error::{Error, Result};
use crate::types::{CleanLevel, NewPackage, Package, Registry, SignatureType, Version};
use crate::verify::{SignatureChecker, SignatureEvidence};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub registry: Registry,
    #[serde(default)]
    pub packages: Vec<ManifestPackage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestPackage {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<i64>,
    #[serde(default)]
    pub downloads_period: Option<String>,
    #[serde(default)]
    pub first_release_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub latest_release_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub versions: Vec<ManifestVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestVersion {
    pub name: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub artifacts: Vec<ManifestArtifact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestArtifact {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub signature_path: Option<PathBuf>,
    #[serde(default)]
    pub signature: Option<CapturedSignature>,
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extensions: Vec<String>,
}

fn default_kind() -> String {
    "file".to_string()
}

/// Signature evidence recorded outside this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedSignature {
    #[serde(rename = "type")]
    pub kind: SignatureType,
    pub raw: String,
    #[serde(default)]
    pub verify_transcript: Option<String>,
    #[serde(default)]
    pub packet_transcript: Option<String>,
}

pub struct ManifestDriver {
    manifest: Manifest,
    base_dir: PathBuf,
    min_downloads: i64,
    signatures_only: bool,
}

impl ManifestDriver {
    pub fn new(manifest: Manifest, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest,
            base_dir: base_dir.into(),
            min_downloads: 0,
            signatures_only: false,
        }
    }

    /// Reads a manifest; relative artifact paths resolve against `base_dir`,
    /// or the manifest's own directory when `base_dir` is `None`.
    pub fn load(path: &Path, base_dir: Option<&Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let manifest: Manifest = serde_json::from_reader(reader)?;
        let base_dir = match base_dir {
            Some(dir) => dir.to_path_buf(),
            None => path.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        Ok(Self::new(manifest, base_dir))
    }

    #[must_use]
    pub fn with_min_downloads(mut self, min_downloads: i64) -> Self {
        self.min_downloads = min_downloads;
        self
    }

    /// Only refresh signature data, keeping artifacts from earlier runs.
    #[must_use]
    pub fn signatures_only(mut self, signatures_only: bool) -> Self {
        self.signatures_only = signatures_only;
        self
    }

    fn package(&self, name: &str) -> Result<&ManifestPackage> {
        self.manifest
            .packages
            .iter()
            .find(|p| p.name == name)
            .ok_or(Error::NotFound)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.base_dir.join(path)
    }

    fn report(
        &self,
        artifact: &ManifestArtifact,
        checker: &dyn SignatureChecker,
    ) -> Result<ArtifactReport> {
        let path = artifact.path.as_deref().map(|p| self.resolve(p));

        let digest = match (&artifact.digest, &path) {
            (Some(digest), _) => Some(digest.clone()),
            (None, Some(path)) => Some(sha256_file(path)?),
            (None, None) => None,
        };

        let signature = match (&artifact.signature, &artifact.signature_path, &path) {
            (Some(captured), _, _) => Some(SignatureEvidence {
                kind: captured.kind,
                raw: captured.raw.clone(),
                verify_transcript: captured.verify_transcript.clone(),
                packet_transcript: captured.packet_transcript.clone(),
                key: None,
            }),
            (None, Some(sig), Some(path)) => Some(checker.check_pgp(path, &self.resolve(sig))?),
            (None, Some(_), None) => {
                return Err(Error::Config(format!(
                    "artifact {} has a signature but no file",
                    artifact.name
                )));
            }
            (None, None, _) => None,
        };

        Ok(ArtifactReport {
            name: artifact.name.clone(),
            kind: artifact.kind.clone(),
            digest,
            date: artifact.date,
            extensions: artifact.extensions.clone(),
            signature,
        })
    }
}

impl RegistryDriver for ManifestDriver {
    fn registry(&self) -> Registry {
        self.manifest.registry
    }

    fn list_packages(&self) -> Result<Vec<NewPackage>> {
        Ok(self
            .manifest
            .packages
            .iter()
            .map(|p| NewPackage {
                registry: self.manifest.registry,
                name: p.name.clone(),
                versions_count: p.versions.len() as i64,
                latest_release_date: p.latest_release_date,
                first_release_date: p.first_release_date,
                downloads: p.downloads,
                downloads_period: p.downloads_period.clone(),
            })
            .collect())
    }

    fn select_versions(&self, package: &Package) -> Result<Option<Vec<VersionListing>>> {
        let entry = self.package(&package.name)?;
        if entry.downloads.unwrap_or(0) < self.min_downloads {
            return Ok(None);
        }

        Ok(Some(
            entry
                .versions
                .iter()
                .map(|v| VersionListing {
                    name: v.name.clone(),
                    date: v.date,
                })
                .collect(),
        ))
    }

    fn collect_artifacts(
        &self,
        package: &Package,
        version: &Version,
        checker: &dyn SignatureChecker,
    ) -> Result<Vec<Result<ArtifactReport>>> {
        let entry = self
            .package(&package.name)?
            .versions
            .iter()
            .find(|v| v.name == version.name)
            .ok_or(Error::NotFound)?;

        Ok(entry
            .artifacts
            .iter()
            .map(|artifact| self.report(artifact, checker))
            .collect())
    }

    fn adoption_clean_level(&self) -> CleanLevel {
        if self.signatures_only {
            CleanLevel::Signatures
        } else {
            CleanLevel::Artifacts
        }
    }
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
