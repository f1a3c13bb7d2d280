//! Dependency hashing

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const DIGITS: &[u8; 64] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz_-";

/// Third-party dependencies from a package manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestDependencies {
    pub dependencies: BTreeMap<String, String>,
    #[serde(rename = "devDependencies")]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl ManifestDependencies {
    /// Every dependency name, runtime and dev
    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.contains_key(name) || self.dev_dependencies.contains_key(name)
    }
}

/// Hash of the key-sorted JSON form of the manifest dependencies. Only the
/// first four bytes of the digest are kept so the value fits an image tag.
pub fn dependency_hash(deps: &ManifestDependencies) -> u32 {
    // BTreeMap keys serialize sorted, so equal manifests hash equally
    let json = serde_json::to_vec(deps).unwrap_or_default();
    let digest = Sha256::digest(&json);
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Encode an integer with 6 bits per digit, most significant digit first
pub fn encode_base64(mut value: u32) -> String {
    let mut digits = Vec::new();
    loop {
        digits.push(DIGITS[(value & 0x3f) as usize]);
        value >>= 6;
        if value == 0 {
            break;
        }
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
