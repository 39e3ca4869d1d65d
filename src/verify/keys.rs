//! Public key lookup: local keyring first, then key servers in priority order.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::Result;

/// Source recorded when the keyring already held the key.
pub const LOCAL_SOURCE: &str = "local";

/// The keyring the verification tool reads from.
///
/// Importing a key changes state shared by every later lookup in the process.
pub trait KeyStore {
    fn has(&self, key_id: &str) -> Result<bool>;
    /// Human-readable listing of the key, used as the lookup transcript.
    fn get(&self, key_id: &str) -> Result<Option<String>>;
    /// Imports key material and returns the tool's transcript.
    fn import(&self, material: &str) -> Result<String>;
}

/// A remote source of public keys.
pub trait KeyServer {
    fn name(&self) -> &str;
    /// Fetches `key_id` into `keystore`, returning everything the exchange printed.
    fn retrieve(&self, key_id: &str, keystore: &dyn KeyStore) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// `"local"`, the key server that produced the key, or `None` if all failed.
    pub source: Option<String>,
    pub transcript: String,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        self.source.is_some()
    }
}

fn imported_one_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"processed:\s*1\b").unwrap())
}

/// True when the transcript reports exactly one key processed.
pub fn imported_one(transcript: &str) -> bool {
    imported_one_regex().is_match(transcript)
}

pub struct KeyResolver<K> {
    keystore: K,
    servers: Vec<Box<dyn KeyServer>>,
}

impl<K: KeyStore> KeyResolver<K> {
    pub fn new(keystore: K, servers: Vec<Box<dyn KeyServer>>) -> Self {
        Self { keystore, servers }
    }

    /// Resolves `key_id`. Exhausting every server is a normal outcome and is
    /// reported as `source: None` with all server transcripts concatenated.
    pub fn resolve(&self, key_id: &str) -> Resolution {
        match self.keystore.has(key_id) {
            Ok(true) => {
                let transcript = match self.keystore.get(key_id) {
                    Ok(listing) => listing.unwrap_or_default(),
                    Err(e) => e.to_string(),
                };
                tracing::debug!(key_id, "Key found in local keyring");
                return Resolution {
                    source: Some(LOCAL_SOURCE.to_string()),
                    transcript,
                };
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(key_id, "Local keyring lookup failed: {e}"),
        }

        let mut transcript = String::new();
        for server in &self.servers {
            let output = match server.retrieve(key_id, &self.keystore) {
                Ok(output) => output,
                Err(e) => format!("{}: {e}\n", server.name()),
            };
            transcript.push_str(&output);

            if imported_one(&output) {
                tracing::debug!(key_id, keyserver = server.name(), "Key retrieved");
                return Resolution {
                    source: Some(server.name().to_string()),
                    transcript,
                };
            }
        }

        tracing::debug!(key_id, "Key not found on any key server");
        Resolution {
            source: None,
            transcript,
        }
    }
}
