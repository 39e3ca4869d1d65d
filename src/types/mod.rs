mod models;
mod registry;
mod status;

pub use models::*;
pub use registry::{CleanLevel, Registry, Stage};
pub use status::{SignatureStatus, SignatureType};
