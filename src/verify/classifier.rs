//! Maps a verification transcript onto a [`SignatureStatus`].
//!
//! Rules are tried in order against the lower-cased transcript and the first
//! match wins. The order is part of the contract: a transcript reporting both
//! an expired key and a good signature is `EXP_PUB`, and a missing public key
//! outranks a good signature.

use crate::types::SignatureStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// Transcript contains any of the (lower-case) markers.
    AnyOf(&'static [&'static str]),
    /// Transcript is the empty string.
    Empty,
}

impl Matcher {
    fn matches(&self, lowered: &str) -> bool {
        match self {
            Self::AnyOf(markers) => markers.iter().any(|m| lowered.contains(m)),
            Self::Empty => lowered.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub matcher: Matcher,
    pub status: SignatureStatus,
}

const fn any_of(markers: &'static [&'static str], status: SignatureStatus) -> Rule {
    Rule {
        matcher: Matcher::AnyOf(markers),
        status,
    }
}

pub const RULES: &[Rule] = &[
    any_of(&["revoked"], SignatureStatus::RevPub),
    any_of(&["invalid public key algorithm"], SignatureStatus::BadPub),
    any_of(&["expired signature"], SignatureStatus::ExpSig),
    any_of(
        &["key expired", "keyexpired", "key has expired"],
        SignatureStatus::ExpPub,
    ),
    any_of(&["no public key", "no_pubkey"], SignatureStatus::NoPub),
    any_of(
        &[
            "bad signature",
            "errsig",
            "ambiguous",
            "not a detached signature",
            "general error",
            "time conflict",
            "bad mpi value",
            "fatal error",
            "segmentation fault",
            "unknown system error",
        ],
        SignatureStatus::BadSig,
    ),
    any_of(&["wrong key usage"], SignatureStatus::BadPub),
    any_of(&["good signature", "goodsig"], SignatureStatus::Good),
    any_of(
        &["no signature", "no such file or directory"],
        SignatureStatus::NoSig,
    ),
    Rule {
        matcher: Matcher::Empty,
        status: SignatureStatus::NoSig,
    },
];

/// Index into [`RULES`] of the first rule matching `transcript`.
pub fn matching_rule(transcript: &str) -> Option<usize> {
    let lowered = transcript.to_lowercase();
    RULES.iter().position(|rule| rule.matcher.matches(&lowered))
}

/// Classifies a verification transcript. Never fails.
///
/// A missing transcript means there was nothing to verify. Output that matches
/// no rule is reported as `OTHER` with a warning, since it usually means the
/// external tool changed its wording.
pub fn classify(transcript: Option<&str>) -> SignatureStatus {
    let Some(transcript) = transcript else {
        return SignatureStatus::NoSig;
    };

    match matching_rule(transcript) {
        Some(idx) => RULES[idx].status,
        None => {
            tracing::warn!(
                transcript = %excerpt(transcript),
                "Unrecognized verification output"
            );
            SignatureStatus::Other
        }
    }
}

fn excerpt(transcript: &str) -> &str {
    const MAX: usize = 200;
    match transcript.char_indices().nth(MAX) {
        Some((idx, _)) => &transcript[..idx],
        None => transcript,
    }
}
