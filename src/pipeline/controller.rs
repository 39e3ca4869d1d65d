use serde::Serialize;
use tracing::{info, warn};

use super::analysis::{self, Summary};
use super::driver::{ArtifactReport, RegistryDriver};
use super::range::WorkRange;
use crate::error::Result;
use crate::store::{Batch, SqliteStore};
use crate::types::*;
use crate::verify::{self, SignatureChecker};

/// Packages per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRequest {
    pub stage: Stage,
    pub range: WorkRange,
    /// Clean the stage's level for the registry before ingesting.
    pub clean: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Work units (packages) visited.
    pub units: usize,
    pub batches: usize,
    /// Rows created at the stage's own level.
    pub inserted: usize,
    /// Packages dropped by the filter.
    pub filtered: usize,
    /// Versions or artifacts skipped after a non-fatal error.
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

/// Drives one stage for one registry.
///
/// Stage order is a convention: nothing stops an operator from running
/// adoption before filter, which simply finds no versions to process.
pub struct Controller<'a> {
    store: &'a SqliteStore,
    driver: &'a dyn RegistryDriver,
    checker: &'a dyn SignatureChecker,
    batch_size: usize,
}

impl<'a> Controller<'a> {
    pub fn new(
        store: &'a SqliteStore,
        driver: &'a dyn RegistryDriver,
        checker: &'a dyn SignatureChecker,
    ) -> Self {
        Self {
            store,
            driver,
            checker,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn registry(&self) -> Registry {
        self.driver.registry()
    }

    /// Level `stage` cleans when asked to start fresh.
    pub fn clean_level(&self, stage: Stage) -> Option<CleanLevel> {
        match stage {
            Stage::Packages => Some(CleanLevel::Packages),
            Stage::Filter => Some(CleanLevel::Versions),
            Stage::Adoption => Some(self.driver.adoption_clean_level()),
            Stage::Analysis => None,
        }
    }

    pub fn run(&self, request: &StageRequest) -> Result<StageReport> {
        let registry = self.registry();
        info!(%registry, stage = %request.stage, start = request.range.start, stop = ?request.range.stop, "Starting stage");

        if request.clean {
            if let Some(level) = self.clean_level(request.stage) {
                let removed = self.store.clean(registry, level)?;
                let total: usize = removed.iter().map(|(_, n)| n).sum();
                info!(%registry, %level, rows = total, "Cleaned before ingest");
            }
        }

        let report = match request.stage {
            Stage::Packages => self.run_packages(request.range)?,
            Stage::Filter => self.run_filter(request.range)?,
            Stage::Adoption => self.run_adoption(request.range)?,
            Stage::Analysis => StageReport {
                summary: Some(analysis::summarize(self.store, registry)?),
                ..StageReport::default()
            },
        };

        info!(
            %registry,
            stage = %request.stage,
            units = report.units,
            inserted = report.inserted,
            skipped = report.skipped,
            "Stage finished"
        );
        Ok(report)
    }

    fn run_packages(&self, range: WorkRange) -> Result<StageReport> {
        let listing = self.driver.list_packages()?;
        let bounds = range.bounds(listing.len());
        let mut report = StageReport::default();

        for (n, chunk) in listing[bounds.clone()].chunks(self.batch_size).enumerate() {
            let inserted = self.store.batch(|b| {
                for package in chunk {
                    b.insert_package(package)?;
                }
                Ok(chunk.len())
            })?;

            report.units += chunk.len();
            report.inserted += inserted;
            report.batches += 1;
            self.log_batch(n, bounds.start, report.units);
        }

        Ok(report)
    }

    fn run_filter(&self, range: WorkRange) -> Result<StageReport> {
        let packages = self.store.list_packages(self.registry())?;
        let bounds = range.bounds(packages.len());
        let mut report = StageReport::default();

        for (n, chunk) in packages[bounds.clone()].chunks(self.batch_size).enumerate() {
            let batch_report = self.store.batch(|b| {
                let mut batch_report = StageReport::default();
                for package in chunk {
                    match self.driver.select_versions(package) {
                        Ok(Some(versions)) => {
                            for version in &versions {
                                b.insert_version(&NewVersion {
                                    package_id: package.id,
                                    name: version.name.clone(),
                                    date: version.date,
                                })?;
                            }
                            b.update_versions_count(package.id, versions.len() as i64)?;
                            batch_report.inserted += versions.len();
                        }
                        Ok(None) => batch_report.filtered += 1,
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            warn!(package = %package.name, "Skipping package: {e}");
                            batch_report.skipped += 1;
                        }
                    }
                }
                Ok(batch_report)
            })?;

            report.units += chunk.len();
            report.inserted += batch_report.inserted;
            report.filtered += batch_report.filtered;
            report.skipped += batch_report.skipped;
            report.batches += 1;
            self.log_batch(n, bounds.start, report.units);
        }

        Ok(report)
    }

    fn run_adoption(&self, range: WorkRange) -> Result<StageReport> {
        let packages = self.store.list_packages(self.registry())?;
        let bounds = range.bounds(packages.len());
        let reuse_artifacts = self.driver.adoption_clean_level() > CleanLevel::Artifacts;
        let mut report = StageReport::default();

        for (n, chunk) in packages[bounds.clone()].chunks(self.batch_size).enumerate() {
            // Read before the batch opens; the batch holds the connection.
            let mut work = Vec::with_capacity(chunk.len());
            for package in chunk {
                work.push((package, self.store.list_versions(package.id)?));
            }

            let batch_report = self.store.batch(|b| {
                let mut batch_report = StageReport::default();
                for (package, versions) in &work {
                    for version in versions {
                        let reports = match self.driver.collect_artifacts(package, version, self.checker) {
                            Ok(reports) => reports,
                            Err(e) if e.is_fatal() => return Err(e),
                            Err(e) => {
                                warn!(package = %package.name, version = %version.name, "Skipping version: {e}");
                                batch_report.skipped += 1;
                                continue;
                            }
                        };

                        for artifact in reports {
                            match artifact {
                                Ok(artifact) => {
                                    record_artifact(b, version.id, &artifact, reuse_artifacts)?;
                                    batch_report.inserted += 1;
                                }
                                Err(e) if e.is_fatal() => return Err(e),
                                Err(e) => {
                                    warn!(package = %package.name, version = %version.name, "Skipping artifact: {e}");
                                    batch_report.skipped += 1;
                                }
                            }
                        }
                    }
                }
                Ok(batch_report)
            })?;

            report.units += chunk.len();
            report.inserted += batch_report.inserted;
            report.skipped += batch_report.skipped;
            report.batches += 1;
            self.log_batch(n, bounds.start, report.units);
        }

        Ok(report)
    }

    fn log_batch(&self, n: usize, start: usize, done: usize) {
        info!(
            registry = %self.registry(),
            batch = n,
            next_start = start + done,
            "Committed batch"
        );
    }
}

/// Persists one artifact with its signature, classification, and packet data.
pub fn record_artifact(
    b: &Batch<'_>,
    version_id: i64,
    artifact: &ArtifactReport,
    reuse_existing: bool,
) -> Result<i64> {
    let existing = if reuse_existing {
        b.artifact_id(version_id, &artifact.name)?
    } else {
        None
    };

    let has_sig = artifact.signature.is_some();
    let artifact_id = match existing {
        Some(id) => {
            b.set_has_sig(id, has_sig)?;
            id
        }
        None => b.insert_artifact(&NewArtifact {
            version_id,
            name: artifact.name.clone(),
            kind: artifact.kind.clone(),
            has_sig,
            digest: artifact.digest.clone(),
            date: artifact.date,
            extensions: artifact.extensions.clone(),
        })?,
    };

    let Some(evidence) = &artifact.signature else {
        b.insert_sig_check(&NewSigCheck {
            artifact_id,
            status: verify::classify(None),
            raw: None,
        })?;
        return Ok(artifact_id);
    };

    let signature_id = b.insert_signature(&NewSignature {
        artifact_id,
        kind: evidence.kind,
        raw: evidence.raw.clone(),
    })?;

    b.insert_sig_check(&NewSigCheck {
        artifact_id,
        status: verify::classify(evidence.verify_transcript.as_deref()),
        raw: evidence.verify_transcript.clone(),
    })?;

    if let Some(dump) = &evidence.packet_transcript {
        b.insert_list_packet(&NewListPacket {
            signature_id,
            metadata: verify::extract(dump),
            raw: dump.clone(),
        })?;
    }

    if let Some(key) = &evidence.key {
        if let Some(source) = &key.resolution.source {
            if !b.has_pgp_key(&key.key_id)? {
                b.insert_pgp_key(&PgpKey {
                    key_id: key.key_id.clone(),
                    keyserver: source.clone(),
                    raw: key.resolution.transcript.clone(),
                })?;
            }
        }
    }

    Ok(artifact_id)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::path::Path;

    use super::*;
    use crate::error::Error;
    use crate::pipeline::driver::VersionListing;
    use crate::verify::keys::{LOCAL_SOURCE, Resolution};
    use crate::verify::session::KeyLookup;
    use crate::verify::SignatureEvidence;

    const PACKET_DUMP: &str = ":signature packet: algo 1, keyid 0011223344556677\n\
                               \tversion 4, created 1600000000, md5len 0, sigclass 0x00\n\
                               \tdigest algo 10, begin of digest 00 00\n\
                               \tdata: [4095 bits]\n";

    struct FakeChecker;

    impl SignatureChecker for FakeChecker {
        fn check_pgp(&self, _artifact: &Path, _signature: &Path) -> Result<SignatureEvidence> {
            unreachable!("fake driver supplies evidence directly")
        }
    }

    /// Packages "pkg-0".."pkg-{n}", each with versions "1.0" and "2.0".
    /// Version "2.0" of "pkg-0" carries a signed jar, an unsigned pom, and a
    /// broken artifact.
    struct FakeDriver {
        packages: usize,
        level: CleanLevel,
        rate_limit_on: Option<&'static str>,
        collected: Cell<usize>,
    }

    impl FakeDriver {
        fn new(packages: usize) -> Self {
            Self {
                packages,
                level: CleanLevel::Artifacts,
                rate_limit_on: None,
                collected: Cell::new(0),
            }
        }
    }

    fn signed(verify: &str) -> SignatureEvidence {
        SignatureEvidence {
            kind: SignatureType::Pgp,
            raw: "-----BEGIN PGP SIGNATURE-----".to_string(),
            verify_transcript: Some(verify.to_string()),
            packet_transcript: Some(PACKET_DUMP.to_string()),
            key: Some(KeyLookup {
                key_id: "0011223344556677".to_string(),
                resolution: Resolution {
                    source: Some(LOCAL_SOURCE.to_string()),
                    transcript: "pub rsa4096".to_string(),
                },
            }),
        }
    }

    fn artifact(name: &str, signature: Option<SignatureEvidence>) -> ArtifactReport {
        ArtifactReport {
            name: name.to_string(),
            kind: "file".to_string(),
            digest: None,
            date: None,
            extensions: vec![],
            signature,
        }
    }

    impl RegistryDriver for FakeDriver {
        fn registry(&self) -> Registry {
            Registry::Maven
        }

        fn list_packages(&self) -> Result<Vec<NewPackage>> {
            Ok((0..self.packages)
                .map(|i| NewPackage {
                    registry: Registry::Maven,
                    name: format!("pkg-{i}"),
                    versions_count: 0,
                    latest_release_date: None,
                    first_release_date: None,
                    downloads: Some(i as i64),
                    downloads_period: None,
                })
                .collect())
        }

        fn select_versions(&self, package: &Package) -> Result<Option<Vec<VersionListing>>> {
            if package.name == "pkg-1" {
                return Ok(None);
            }
            Ok(Some(
                ["1.0", "2.0"]
                    .into_iter()
                    .map(|name| VersionListing {
                        name: name.to_string(),
                        date: None,
                    })
                    .collect(),
            ))
        }

        fn collect_artifacts(
            &self,
            package: &Package,
            version: &Version,
            _checker: &dyn SignatureChecker,
        ) -> Result<Vec<Result<ArtifactReport>>> {
            self.collected.set(self.collected.get() + 1);
            if self.rate_limit_on == Some(package.name.as_str()) {
                return Err(Error::RateLimited("fake registry".into()));
            }
            if package.name != "pkg-0" || version.name != "2.0" {
                return Ok(vec![]);
            }
            Ok(vec![
                Ok(artifact("lib.jar", Some(signed("[GNUPG:] GOODSIG 0011223344556677")))),
                Ok(artifact("lib.pom", None)),
                Err(Error::Tool("download failed".into())),
            ])
        }

        fn adoption_clean_level(&self) -> CleanLevel {
            self.level
        }
    }

    fn run(store: &SqliteStore, driver: &FakeDriver, stage: Stage, clean: bool) -> Result<StageReport> {
        Controller::new(store, driver, &FakeChecker)
            .with_batch_size(2)
            .run(&StageRequest {
                stage,
                range: WorkRange::ALL,
                clean,
            })
    }

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    fn status_of(store: &SqliteStore, artifact: &str) -> SignatureStatus {
        let conn = store.connection();
        let id: i64 = conn
            .query_row(
                "SELECT sig_check.status FROM sig_check
                 JOIN artifacts ON artifacts.id = sig_check.artifact_id
                 WHERE artifacts.name = ?1",
                [artifact],
                |row| row.get(0),
            )
            .unwrap();
        SignatureStatus::from_id(id).unwrap()
    }

    #[test]
    fn test_packages_stage_respects_range_and_batches() {
        let store = store();
        let driver = FakeDriver::new(5);

        let report = Controller::new(&store, &driver, &FakeChecker)
            .with_batch_size(2)
            .run(&StageRequest {
                stage: Stage::Packages,
                range: WorkRange::from_cli(1, 4),
                clean: false,
            })
            .unwrap();

        assert_eq!(report.units, 3);
        assert_eq!(report.inserted, 3);
        assert_eq!(report.batches, 2);
        let names: Vec<_> = store
            .list_packages(Registry::Maven)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["pkg-1", "pkg-2", "pkg-3"]);
    }

    #[test]
    fn test_rerun_without_clean_is_rejected() {
        let store = store();
        let driver = FakeDriver::new(3);

        run(&store, &driver, Stage::Packages, false).unwrap();
        let err = run(&store, &driver, Stage::Packages, false).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        run(&store, &driver, Stage::Packages, true).unwrap();
        assert_eq!(store.count("packages", Registry::Maven).unwrap(), 3);
    }

    #[test]
    fn test_filter_stage_records_versions() {
        let store = store();
        let driver = FakeDriver::new(3);
        run(&store, &driver, Stage::Packages, false).unwrap();

        let report = run(&store, &driver, Stage::Filter, false).unwrap();
        assert_eq!(report.units, 3);
        assert_eq!(report.filtered, 1);
        assert_eq!(report.inserted, 4);

        let pkg0 = store.get_package(Registry::Maven, "pkg-0").unwrap().unwrap();
        assert_eq!(pkg0.versions_count, 2);

        // Clean-first re-run replaces versions instead of colliding.
        run(&store, &driver, Stage::Filter, true).unwrap();
        assert_eq!(store.count("versions", Registry::Maven).unwrap(), 4);
    }

    #[test]
    fn test_adoption_stage_classifies_and_persists() {
        let store = store();
        let driver = FakeDriver::new(2);
        run(&store, &driver, Stage::Packages, false).unwrap();
        run(&store, &driver, Stage::Filter, false).unwrap();

        let report = run(&store, &driver, Stage::Adoption, false).unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped, 1);

        assert_eq!(status_of(&store, "lib.jar"), SignatureStatus::Good);
        assert_eq!(status_of(&store, "lib.pom"), SignatureStatus::NoSig);
        assert_eq!(store.count("signatures", Registry::Maven).unwrap(), 1);
        assert_eq!(store.count("list_packets", Registry::Maven).unwrap(), 1);
        assert_eq!(store.count_signed_artifacts(Registry::Maven).unwrap(), 1);
        assert_eq!(
            store.packet_sizes(Registry::Maven).unwrap(),
            vec![(Some(1), Some(4095))]
        );

        let key = store.get_pgp_key("0011223344556677").unwrap().unwrap();
        assert_eq!(key.keyserver, LOCAL_SOURCE);

        // Cleaned re-run does not trip over the cached key.
        run(&store, &driver, Stage::Adoption, true).unwrap();
        assert_eq!(store.count("artifacts", Registry::Maven).unwrap(), 2);
    }

    #[test]
    fn test_signatures_only_keeps_artifacts() {
        let store = store();
        let mut driver = FakeDriver::new(1);
        run(&store, &driver, Stage::Packages, false).unwrap();
        run(&store, &driver, Stage::Filter, false).unwrap();
        run(&store, &driver, Stage::Adoption, false).unwrap();

        let conn_ids = |store: &SqliteStore| -> Vec<i64> {
            let conn = store.connection();
            let mut stmt = conn.prepare("SELECT id FROM artifacts ORDER BY id").unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .collect::<std::result::Result<Vec<_>, _>>()
                .unwrap()
        };
        let before = conn_ids(&store);

        driver.level = CleanLevel::Signatures;
        run(&store, &driver, Stage::Adoption, true).unwrap();

        assert_eq!(conn_ids(&store), before);
        assert_eq!(store.count("sig_check", Registry::Maven).unwrap(), 2);
        assert_eq!(status_of(&store, "lib.jar"), SignatureStatus::Good);
    }

    #[test]
    fn test_signature_refresh_updates_has_sig() {
        let store = store();
        let version_id = store
            .batch(|b| {
                let package_id = b.insert_package(&NewPackage {
                    registry: Registry::Maven,
                    name: "pkg-0".to_string(),
                    versions_count: 1,
                    latest_release_date: None,
                    first_release_date: None,
                    downloads: None,
                    downloads_period: None,
                })?;
                let version_id = b.insert_version(&NewVersion {
                    package_id,
                    name: "1.0".to_string(),
                    date: None,
                })?;
                record_artifact(b, version_id, &artifact("lib.jar", None), false)?;
                Ok(version_id)
            })
            .unwrap();
        assert_eq!(store.count_signed_artifacts(Registry::Maven).unwrap(), 0);

        // Unsigned to signed.
        store.clean(Registry::Maven, CleanLevel::Signatures).unwrap();
        let signed_artifact = artifact("lib.jar", Some(signed("gpg: Good signature")));
        store
            .batch(|b| record_artifact(b, version_id, &signed_artifact, true))
            .unwrap();
        assert_eq!(store.count("artifacts", Registry::Maven).unwrap(), 1);
        assert_eq!(store.count("signatures", Registry::Maven).unwrap(), 1);
        assert_eq!(store.count_signed_artifacts(Registry::Maven).unwrap(), 1);
        assert_eq!(status_of(&store, "lib.jar"), SignatureStatus::Good);

        // Signed back to unsigned.
        store.clean(Registry::Maven, CleanLevel::Signatures).unwrap();
        store
            .batch(|b| record_artifact(b, version_id, &artifact("lib.jar", None), true))
            .unwrap();
        assert_eq!(store.count("signatures", Registry::Maven).unwrap(), 0);
        assert_eq!(store.count_signed_artifacts(Registry::Maven).unwrap(), 0);
        assert_eq!(status_of(&store, "lib.jar"), SignatureStatus::NoSig);
    }

    #[test]
    fn test_rate_limit_aborts_and_rolls_back_batch() {
        let store = store();
        let mut driver = FakeDriver::new(3);
        run(&store, &driver, Stage::Packages, false).unwrap();
        run(&store, &driver, Stage::Filter, false).unwrap();

        driver.rate_limit_on = Some("pkg-2");
        let err = run(&store, &driver, Stage::Adoption, false).unwrap_err();
        assert!(matches!(err, Error::RateLimited(_)));

        // First batch (pkg-0, pkg-1) committed; second batch rolled back.
        assert_eq!(store.count("artifacts", Registry::Maven).unwrap(), 2);
        // pkg-1 was filtered out and has no versions to visit.
        assert_eq!(driver.collected.get(), 3);
    }

    #[test]
    fn test_adoption_before_filter_finds_nothing() {
        let store = store();
        let driver = FakeDriver::new(2);
        run(&store, &driver, Stage::Packages, false).unwrap();

        let report = run(&store, &driver, Stage::Adoption, false).unwrap();
        assert_eq!(report.units, 2);
        assert_eq!(report.inserted, 0);
        assert_eq!(driver.collected.get(), 0);
    }

    #[test]
    fn test_clean_levels_per_stage() {
        let store = store();
        let mut driver = FakeDriver::new(0);
        let controller = Controller::new(&store, &driver, &FakeChecker);
        assert_eq!(controller.clean_level(Stage::Packages), Some(CleanLevel::Packages));
        assert_eq!(controller.clean_level(Stage::Filter), Some(CleanLevel::Versions));
        assert_eq!(controller.clean_level(Stage::Adoption), Some(CleanLevel::Artifacts));
        assert_eq!(controller.clean_level(Stage::Analysis), None);

        driver.level = CleanLevel::Signatures;
        let controller = Controller::new(&store, &driver, &FakeChecker);
        assert_eq!(controller.clean_level(Stage::Adoption), Some(CleanLevel::Signatures));
    }

    #[test]
    fn test_analysis_stage_summarizes() {
        let store = store();
        let driver = FakeDriver::new(2);
        run(&store, &driver, Stage::Packages, false).unwrap();
        run(&store, &driver, Stage::Filter, false).unwrap();
        run(&store, &driver, Stage::Adoption, false).unwrap();

        let summary = run(&store, &driver, Stage::Analysis, true)
            .unwrap()
            .summary
            .unwrap();
        assert_eq!(summary.packages, 2);
        assert_eq!(summary.artifacts, 2);
        assert_eq!(summary.signed_artifacts, 1);
        assert_eq!(summary.statuses.get("GOOD"), Some(&1));
        assert_eq!(summary.statuses.get("NO_SIG"), Some(&1));
        assert_eq!(summary.key_sizes.len(), 1);
        assert_eq!(summary.key_sizes[0].bits, 4096);
    }
}
