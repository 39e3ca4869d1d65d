mod pipeline;

pub use pipeline::{DEFAULT_KEYSERVERS, KeyserverProtocol, PipelineConfig};
