//! PKCE verifier/challenge generation for the authorization code flow.

use awsoidc_core::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::fmt;

/// Longest verifier RFC 7636 allows.
pub const VERIFIER_MAX_LENGTH: usize = 128;
/// Shortest verifier RFC 7636 allows.
pub const VERIFIER_MIN_LENGTH: usize = 43;

// 96 bytes encode to exactly 128 base64url characters.
const VERIFIER_ENTROPY_BYTES: usize = VERIFIER_MAX_LENGTH / 4 * 3;

pub const CHALLENGE_METHOD: &str = "S256";

#[derive(Clone)]
pub struct PkcePair {
    verifier: String,
    challenge: String,
}

impl PkcePair {
    /// Generate a fresh pair from the OS random source.
    pub fn generate() -> Result<Self> {
        let mut random = [0u8; VERIFIER_ENTROPY_BYTES];
        OsRng
            .try_fill_bytes(&mut random)
            .map_err(|e| Error::Randomness(e.to_string()))?;
        Ok(Self::from_verifier(URL_SAFE_NO_PAD.encode(random)))
    }

    fn from_verifier(verifier: String) -> Self {
        let challenge = code_challenge_s256(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    pub fn method(&self) -> &'static str {
        CHALLENGE_METHOD
    }
}

impl fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"***")
            .field("challenge", &self.challenge)
            .finish()
    }
}

pub fn code_challenge_s256(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}
