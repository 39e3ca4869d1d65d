//! # Sigadopt
//!
//! Measures how widely packages in public registries are signed, usable both
//! as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! sigadopt = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use sigadopt::pipeline::{Controller, ManifestDriver, StageRequest, WorkRange};
//! use sigadopt::store::SqliteStore;
//! use sigadopt::types::Stage;
//!
//! let store = SqliteStore::new("./data/sigadopt.db").unwrap();
//! store.initialize().unwrap();
//!
//! let driver = ManifestDriver::load("maven.json".as_ref(), None).unwrap();
//! let controller = Controller::new(&store, &driver, &checker);
//! controller
//!     .run(&StageRequest { stage: Stage::Packages, range: WorkRange::ALL, clean: false })
//!     .unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod types;
pub mod verify;
