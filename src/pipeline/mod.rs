//! Stage orchestration: packages, filter, adoption, analysis.

pub mod analysis;
mod controller;
pub mod driver;
pub mod manifest;
mod range;

pub use controller::{Controller, DEFAULT_BATCH_SIZE, StageReport, StageRequest, record_artifact};
pub use driver::{ArtifactReport, RegistryDriver, VersionListing};
pub use manifest::ManifestDriver;
pub use range::WorkRange;
