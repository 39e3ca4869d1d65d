//! CLI integration tests for the sigadopt pipeline commands.
//!
//! Each test uses an isolated temp directory for the database and manifest,
//! so tests can run in parallel safely. Manifests carry captured transcripts,
//! so no gpg installation is needed.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use std::path::Path;

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;

const MANIFEST: &str = r#"{
    "registry": "maven",
    "packages": [
        {"name": "org.example:core", "downloads": 5000, "versions": [
            {"name": "1.0", "artifacts": [
                {"name": "core-1.0.pom", "kind": "pom", "path": "core-1.0.pom"},
                {"name": "core-1.0.jar", "kind": "jar", "digest": "c0ffee",
                 "signature": {
                    "type": "pgp",
                    "raw": "-----BEGIN PGP SIGNATURE-----",
                    "verify_transcript": "gpg: Good signature from \"Example Release <release@example.org>\"",
                    "packet_transcript": ":signature packet: algo 1, keyid 0A1B2C3D4E5F6789\n\tversion 4, created 1700000000, md5len 0, sigclass 0x00\n\tdigest algo 8, begin of digest 3f 2a\n\tdata: [4095 bits]\n"
                 }}
            ]}
        ]},
        {"name": "org.example:tiny", "downloads": 4, "versions": [
            {"name": "0.1", "artifacts": [{"name": "tiny-0.1.jar", "digest": "beef"}]}
        ]},
        {"name": "org.example:util", "downloads": 900, "versions": [
            {"name": "2.1", "artifacts": [
                {"name": "util-2.1.jar", "path": "util-2.1.jar", "signature_path": "util-2.1.jar.asc"}
            ]}
        ]}
    ]
}"#;

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        temp_dir
            .child("manifest.json")
            .write_str(MANIFEST)
            .expect("failed to write manifest");
        temp_dir
            .child("core-1.0.pom")
            .write_str("<project/>")
            .expect("failed to write artifact");
        temp_dir
            .child("util-2.1.jar")
            .write_str("jar bytes")
            .expect("failed to write artifact");
        temp_dir
            .child("util-2.1.jar.asc")
            .write_str("-----BEGIN PGP SIGNATURE-----")
            .expect("failed to write signature");
        // No real gpg: verifying a detached signature fails and is skipped.
        temp_dir
            .child("sigadopt.toml")
            .write_str("min_downloads = 100\ngpg_program = \"/nonexistent/gpg\"\nkeyservers = []\n")
            .expect("failed to write config");
        Self { temp_dir }
    }

    fn path(&self, name: &str) -> String {
        self.temp_dir.path().join(name).to_string_lossy().to_string()
    }

    fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    fn data_dir_str(&self) -> String {
        self.data_dir().join("data").to_string_lossy().to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("sigadopt").expect("failed to find binary");
        cmd.env("NO_COLOR", "1");
        cmd.args([
            "--data-dir",
            &self.data_dir_str(),
            "--config",
            &self.path("sigadopt.toml"),
        ]);
        cmd
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.cmd().arg("init").assert()
    }

    fn run_stage(&self, stage: &str, extra: &[&str]) -> assert_cmd::assert::Assert {
        self.cmd()
            .args([
                "run",
                stage,
                "--registry",
                "maven",
                "--manifest",
                &self.path("manifest.json"),
            ])
            .args(extra)
            .assert()
    }

    fn stage_json(&self, stage: &str, extra: &[&str]) -> Value {
        let mut args = vec!["--json"];
        args.extend_from_slice(extra);
        let output = self.run_stage(stage, &args).success();
        serde_json::from_slice(&output.get_output().stdout).expect("failed to parse JSON")
    }

    fn summary_json(&self, registry: &str) -> Value {
        let output = self
            .cmd()
            .args(["summary", "--registry", registry, "--json"])
            .output()
            .expect("failed to run command");

        serde_json::from_slice(&output.stdout).expect("failed to parse JSON")
    }

    fn run_all(&self) {
        self.run_stage("packages", &[]).success();
        self.run_stage("filter", &[]).success();
        self.run_stage("adoption", &[]).success();
    }
}

#[test]
fn test_init_creates_database() {
    let ctx = TestContext::new();

    ctx.init()
        .success()
        .stdout(predicate::str::contains("Initialized database"));
    assert!(ctx.data_dir().join("data/sigadopt.db").exists());

    ctx.init()
        .success()
        .stdout(predicate::str::contains("up to date"));
}

#[test]
fn test_commands_require_init() {
    let ctx = TestContext::new();

    ctx.run_stage("packages", &[])
        .failure()
        .stderr(predicate::str::contains("sigadopt init"));
}

#[test]
fn test_full_pipeline_summary() {
    let ctx = TestContext::new();
    ctx.init().success();

    let packages = ctx.stage_json("packages", &[]);
    assert_eq!(packages["inserted"], 3);
    assert_eq!(packages["batches"], 1);

    let filter = ctx.stage_json("filter", &[]);
    assert_eq!(filter["filtered"], 1);
    assert_eq!(filter["inserted"], 2);

    let adoption = ctx.stage_json("adoption", &[]);
    assert_eq!(adoption["inserted"], 2);
    assert_eq!(adoption["skipped"], 1);

    let summary = ctx.summary_json("maven");
    assert_eq!(summary["packages"], 3);
    assert_eq!(summary["versions"], 2);
    assert_eq!(summary["artifacts"], 2);
    assert_eq!(summary["signed_artifacts"], 1);
    assert_eq!(summary["statuses"]["GOOD"], 1);
    assert_eq!(summary["statuses"]["NO_SIG"], 1);
    assert_eq!(summary["key_sizes"][0]["bits"], 4096);

    // Other registries are untouched.
    assert_eq!(ctx.summary_json("pypi")["packages"], 0);
}

#[test]
fn test_analysis_stage_needs_no_manifest() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.run_all();

    ctx.cmd()
        .args(["run", "analysis", "--registry", "maven"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MAVEN adoption"))
        .stdout(predicate::str::contains("GOOD"));
}

#[test]
fn test_other_stages_need_manifest() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.cmd()
        .args(["run", "packages", "--registry", "maven"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--manifest is required"));
}

#[test]
fn test_rerun_without_clean_fails() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.run_stage("packages", &[]).success();

    ctx.run_stage("packages", &[])
        .failure()
        .stderr(predicate::str::contains("already exists"));

    let rerun = ctx.stage_json("packages", &["--clean"]);
    assert_eq!(rerun["inserted"], 3);
    assert_eq!(ctx.summary_json("maven")["packages"], 3);
}

#[test]
fn test_range_limits_packages() {
    let ctx = TestContext::new();
    ctx.init().success();

    let first = ctx.stage_json("packages", &["--stop", "1"]);
    assert_eq!(first["inserted"], 1);

    let rest = ctx.stage_json("packages", &["--start", "1", "--stop", "-1", "--batch-size", "1"]);
    assert_eq!(rest["inserted"], 2);
    assert_eq!(rest["batches"], 2);
    assert_eq!(ctx.summary_json("maven")["packages"], 3);
}

#[test]
fn test_clean_requires_confirmation() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.run_all();

    ctx.cmd()
        .args([
            "clean",
            "--registry",
            "maven",
            "--level",
            "artifacts",
            "--non-interactive",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes is required"));
    assert_eq!(ctx.summary_json("maven")["artifacts"], 2);

    ctx.cmd()
        .args(["clean", "--registry", "maven", "--level", "artifacts", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sig_check"));

    let summary = ctx.summary_json("maven");
    assert_eq!(summary["artifacts"], 0);
    assert_eq!(summary["versions"], 2);
    assert_eq!(summary["packages"], 3);
}

#[test]
fn test_invalid_arguments() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.cmd()
        .args(["summary", "--registry", "npm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown registry"));

    ctx.cmd()
        .args(["clean", "--registry", "maven", "--level", "everything", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown clean level"));

    ctx.cmd()
        .args(["run", "publish", "--registry", "maven"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown stage"));
}

#[test]
fn test_manifest_registry_must_match() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.cmd()
        .args([
            "run",
            "packages",
            "--registry",
            "pypi",
            "--manifest",
            &ctx.path("manifest.json"),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not PYPI"));
}

#[test]
fn test_classify_transcripts() {
    let ctx = TestContext::new();

    ctx.cmd()
        .arg("classify")
        .write_stdin("gpg: BAD signature from \"Mallory\"")
        .assert()
        .success()
        .stdout("BAD_SIG\n");

    let transcript = ctx.temp_dir.child("verify.txt");
    transcript
        .write_str(":signature packet: algo 17, keyid ABCDEF0123456789\ngpg: Can't check signature: No public key\n")
        .unwrap();

    ctx.cmd()
        .args(["classify", "--packets", &ctx.path("verify.txt")])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("NO_PUB\n"))
        .stdout(predicate::str::contains("\"key_id\": \"ABCDEF0123456789\""));

    ctx.cmd()
        .arg("classify")
        .write_stdin("")
        .assert()
        .success()
        .stdout("NO_SIG\n");
}
