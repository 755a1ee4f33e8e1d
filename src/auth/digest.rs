//! Secret Digesting
//!
//! Submitted secrets are digested before comparison or caching; clear-text
//! secrets are never stored anywhere in this crate.

use crate::config::{DigestAlgorithm, DigestEncoding};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use ring::digest;

/// Computes opaque digests of submitted secrets with a configured
/// algorithm and text encoding.
#[derive(Debug, Clone, Copy)]
pub struct SecretDigester {
    algorithm: DigestAlgorithm,
    encoding: DigestEncoding,
}

impl SecretDigester {
    pub fn new(algorithm: DigestAlgorithm, encoding: DigestEncoding) -> Self {
        Self {
            algorithm,
            encoding,
        }
    }

    pub fn digest(&self, secret: &str) -> String {
        let algorithm = match self.algorithm {
            DigestAlgorithm::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
            DigestAlgorithm::Sha256 => &digest::SHA256,
            DigestAlgorithm::Sha384 => &digest::SHA384,
            DigestAlgorithm::Sha512 => &digest::SHA512,
        };
        let output = digest::digest(algorithm, secret.as_bytes());
        match self.encoding {
            DigestEncoding::Hex => hex::encode(output.as_ref()),
            DigestEncoding::Base64 => BASE64_STANDARD.encode(output.as_ref()),
        }
    }
}

impl Default for SecretDigester {
    fn default() -> Self {
        Self::new(DigestAlgorithm::default(), DigestEncoding::default())
    }
}
