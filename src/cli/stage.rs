use std::path::{Path, PathBuf};

use anyhow::bail;
use tracing::info;

use crate::config::{KeyserverProtocol, PipelineConfig};
use crate::pipeline::manifest::Manifest;
use crate::pipeline::{
    Controller, ManifestDriver, RegistryDriver, StageReport, StageRequest, WorkRange,
};
use crate::types::{Registry, Stage};
use crate::verify::gpg::{Gpg, GpgKeyServer, GpgKeyring};
use crate::verify::hkp::HkpKeyServer;
use crate::verify::{KeyResolver, KeyServer, PgpSession};

use super::commands::StageArgs;
use super::init_store;
use super::summary::print_summary;

/// Verification session over the configured gpg and key servers.
fn build_checker(config: &PipelineConfig) -> anyhow::Result<PgpSession<GpgKeyring>> {
    let gpg = Gpg::new(config.gpg_program.clone(), config.gnupg_home.clone());

    let mut servers: Vec<Box<dyn KeyServer>> = Vec::with_capacity(config.keyservers.len());
    for url in &config.keyservers {
        match config.keyserver_protocol {
            KeyserverProtocol::Gpg => {
                servers.push(Box::new(GpgKeyServer::new(gpg.clone(), url.as_str())));
            }
            KeyserverProtocol::Hkp => servers.push(Box::new(HkpKeyServer::new(url)?)),
        }
    }

    let resolver = KeyResolver::new(GpgKeyring::new(gpg.clone()), servers);
    Ok(PgpSession::new(Box::new(gpg), resolver))
}

fn build_driver(
    config: &PipelineConfig,
    args: &StageArgs,
    stage: Stage,
    registry: Registry,
) -> anyhow::Result<ManifestDriver> {
    let work_dir = args
        .work_dir
        .as_ref()
        .map(PathBuf::from)
        .or_else(|| config.work_dir.clone());

    let driver = match &args.manifest {
        Some(path) => ManifestDriver::load(Path::new(path), work_dir.as_deref())?,
        // Analysis only reads the store.
        None if stage == Stage::Analysis => ManifestDriver::new(
            Manifest {
                registry,
                packages: Vec::new(),
            },
            work_dir.unwrap_or_default(),
        ),
        None => bail!("--manifest is required for the {stage} stage"),
    };

    if driver.registry() != registry {
        bail!(
            "Manifest describes {}, not {registry}",
            driver.registry()
        );
    }

    Ok(driver
        .with_min_downloads(config.min_downloads)
        .signatures_only(args.signatures_only))
}

pub fn run_stage(config: &PipelineConfig, args: StageArgs) -> anyhow::Result<()> {
    let stage: Stage = args.stage.parse()?;
    let registry: Registry = args.registry.parse()?;
    let store = init_store(config)?;

    let driver = build_driver(config, &args, stage, registry)?;
    let checker = build_checker(config)?;
    let controller = Controller::new(&store, &driver, &checker)
        .with_batch_size(args.batch_size.unwrap_or(config.batch_size));

    let request = StageRequest {
        stage,
        range: WorkRange::from_cli(args.start, args.stop),
        clean: args.clean,
    };
    info!(%stage, %registry, start = args.start, stop = args.stop, "Running stage");

    let report = controller.run(&request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(stage, &report);
    }
    Ok(())
}

fn print_report(stage: Stage, report: &StageReport) {
    if let Some(summary) = &report.summary {
        print_summary(summary);
        return;
    }

    println!(
        "{stage}: {} packages in {} batches, {} inserted, {} filtered, {} skipped",
        report.units, report.batches, report.inserted, report.filtered, report.skipped
    );
}
