//! Structured fields pulled out of a `--list-packets` dump.
//!
//! Every field is matched independently; a field the dump does not mention is
//! `None` and never prevents the others from being read.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Public-key algorithm ids (RFC 4880 9.1) that denote RSA.
const RSA_ALGOS: [u32; 3] = [1, 2, 3];

const RSA_BUCKET_BITS: u64 = 512;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketMetadata {
    pub algo: Option<u32>,
    pub digest_algo: Option<u32>,
    /// Length of the signature MPI in bits.
    pub data_bits: Option<u32>,
    pub key_id: Option<String>,
    /// Signature creation time, seconds since epoch.
    pub created: Option<i64>,
    pub expires: bool,
}

fn algo_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":signature packet: algo (\d+)").unwrap())
}

fn key_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"keyid ([0-9A-Fa-f]+)").unwrap())
}

fn created_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"created (\d+)").unwrap())
}

fn digest_algo_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"digest algo (\d+)").unwrap())
}

fn data_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"data: \[(\d+) bits\]").unwrap())
}

fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

pub fn extract(packet_dump: &str) -> PacketMetadata {
    PacketMetadata {
        algo: capture(algo_regex(), packet_dump).and_then(|s| s.parse().ok()),
        digest_algo: capture(digest_algo_regex(), packet_dump).and_then(|s| s.parse().ok()),
        data_bits: capture(data_regex(), packet_dump).and_then(|s| s.parse().ok()),
        key_id: capture(key_id_regex(), packet_dump).map(str::to_uppercase),
        created: capture(created_regex(), packet_dump).and_then(|s| s.parse().ok()),
        expires: packet_dump.contains("expires"),
    }
}

/// Normalizes a signature size for reporting.
///
/// RSA sizes are rounded up to the next multiple of 512 bits since the dump
/// reports the MPI length, which drops leading zero bits. Exact multiples stay
/// put. Other algorithms are reported as-is.
pub fn key_size_bucket(algo: Option<u32>, bits: u32) -> u64 {
    let bits = u64::from(bits);
    if algo.is_some_and(|a| RSA_ALGOS.contains(&a)) {
        bits.div_ceil(RSA_BUCKET_BITS) * RSA_BUCKET_BITS
    } else {
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_DUMP: &str = "\
# off=0 ctb=89 tag=2 hlen=3 plen=540
:signature packet: algo 1, keyid 7a5e26a4b6b4a26f
\tversion 4, created 1565110000, md5len 0, sigclass 0x00
\tdigest algo 8, begin of digest 54 3c
\thashed subpkt 2 len 4 (sig created 2019-08-06)
\thashed subpkt 3 len 4 (sig expires after 2y0d0h0m)
\tsubpkt 16 len 8 (issuer key ID 7A5E26A4B6B4A26F)
\tdata: [2047 bits]
";

    #[test]
    fn test_extract_full_dump() {
        let meta = extract(RSA_DUMP);
        assert_eq!(meta.algo, Some(1));
        assert_eq!(meta.digest_algo, Some(8));
        assert_eq!(meta.data_bits, Some(2047));
        assert_eq!(meta.key_id.as_deref(), Some("7A5E26A4B6B4A26F"));
        assert_eq!(meta.created, Some(1_565_110_000));
        assert!(meta.expires);
    }

    #[test]
    fn test_extract_missing_fields_are_none() {
        let meta = extract("gpg: no valid OpenPGP data found.\n\tdata: [256 bits]");
        assert_eq!(meta.algo, None);
        assert_eq!(meta.digest_algo, None);
        assert_eq!(meta.key_id, None);
        assert_eq!(meta.created, None);
        assert_eq!(meta.data_bits, Some(256));
        assert!(!meta.expires);
    }

    #[test]
    fn test_extract_empty() {
        assert_eq!(extract(""), PacketMetadata::default());
    }

    #[test]
    fn test_digest_algo_does_not_shadow_algo() {
        let meta = extract("\tdigest algo 10, begin of digest 00 00");
        assert_eq!(meta.algo, None);
        assert_eq!(meta.digest_algo, Some(10));
    }

    #[test]
    fn test_rsa_bucket_rounds_up() {
        let bits = extract(RSA_DUMP).data_bits.unwrap();
        assert_eq!(key_size_bucket(Some(1), bits), 2048);
        assert_eq!(key_size_bucket(Some(1), 2048), 2048);
        assert_eq!(key_size_bucket(Some(1), 4093), 4096);
        assert_eq!(key_size_bucket(Some(1), 2049), 2560);
    }

    #[test]
    fn test_rsa_bucket_near_u32_max() {
        assert_eq!(key_size_bucket(Some(1), u32::MAX), 4_294_967_296);
        assert_eq!(key_size_bucket(Some(2), 4_294_966_785), 4_294_967_296);
        assert_eq!(key_size_bucket(Some(17), u32::MAX), u64::from(u32::MAX));
    }

    #[test]
    fn test_non_rsa_bucket_unchanged() {
        assert_eq!(key_size_bucket(Some(22), 255), 255);
        assert_eq!(key_size_bucket(None, 2047), 2047);
    }
}
