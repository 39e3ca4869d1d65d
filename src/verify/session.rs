use std::fs;
use std::path::Path;

use super::keys::{KeyResolver, KeyStore, Resolution};
use super::packets;
use crate::error::Result;
use crate::types::SignatureType;

/// Runs the external verification tool.
pub trait Verifier {
    /// Packet dump of a detached signature.
    fn list_packets(&self, signature: &Path) -> Result<String>;
    /// Combined verification output for `artifact` against `signature`.
    fn verify(&self, signature: &Path, artifact: &Path) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLookup {
    pub key_id: String,
    pub resolution: Resolution,
}

/// Raw material gathered for one signed artifact, ready to classify and store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEvidence {
    pub kind: SignatureType,
    /// The signature itself, or a reference to it.
    pub raw: String,
    pub verify_transcript: Option<String>,
    pub packet_transcript: Option<String>,
    pub key: Option<KeyLookup>,
}

/// Checks detached PGP signatures on behalf of registry drivers.
pub trait SignatureChecker {
    fn check_pgp(&self, artifact: &Path, signature: &Path) -> Result<SignatureEvidence>;
}

/// list-packets, then key lookup for the issuer, then verification.
///
/// The key is looked up before verifying so that a key fetched from a key
/// server is already in the keyring when the tool checks the signature.
pub struct PgpSession<K> {
    verifier: Box<dyn Verifier>,
    resolver: KeyResolver<K>,
}

impl<K: KeyStore> PgpSession<K> {
    pub fn new(verifier: Box<dyn Verifier>, resolver: KeyResolver<K>) -> Self {
        Self { verifier, resolver }
    }
}

impl<K: KeyStore> SignatureChecker for PgpSession<K> {
    fn check_pgp(&self, artifact: &Path, signature: &Path) -> Result<SignatureEvidence> {
        let raw = String::from_utf8_lossy(&fs::read(signature)?).into_owned();
        let packet_transcript = self.verifier.list_packets(signature)?;

        let key = packets::extract(&packet_transcript)
            .key_id
            .map(|key_id| KeyLookup {
                resolution: self.resolver.resolve(&key_id),
                key_id,
            });

        let verify_transcript = self.verifier.verify(signature, artifact)?;

        Ok(SignatureEvidence {
            kind: SignatureType::Pgp,
            raw,
            verify_transcript: Some(verify_transcript),
            packet_transcript: Some(packet_transcript),
            key,
        })
    }
}
