//! Verification classification: status classifier, packet metadata
//! extractor, key resolver, and the adapters around the external tool.

pub mod classifier;
pub mod gpg;
pub mod hkp;
pub mod keys;
pub mod packets;
pub mod session;

pub use classifier::classify;
pub use keys::{KeyResolver, KeyServer, KeyStore, Resolution};
pub use packets::{PacketMetadata, extract, key_size_bucket};
pub use session::{PgpSession, SignatureChecker, SignatureEvidence, Verifier};
