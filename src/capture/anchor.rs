//! Content anchors computed with BLAKE3.

use crate::types::Hash;
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content-addressed position marker.
///
/// Anchor = hash("anchor" || marker_len || normalized marker)
///
/// The marker is the text of the content block at the captured position.
/// Whitespace runs are collapsed before hashing so that reflowed markup
/// still resolves to the same anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Anchor(Hash);

impl Anchor {
    /// Derive an anchor from a content marker. Blank markers carry no
    /// position information and yield `None`.
    pub fn derive(marker: &str) -> Option<Self> {
        let normalized = normalize_marker(marker);
        if normalized.is_empty() {
            return None;
        }
        let bytes = normalized.as_bytes();

        let mut hasher = Hasher::new();

        // Type discriminator
        hasher.update(b"anchor");

        // Marker length (8 bytes, big-endian)
        hasher.update(&(bytes.len() as u64).to_be_bytes());

        hasher.update(bytes);

        Some(Self(*hasher.finalize().as_bytes()))
    }

    pub fn from_bytes(bytes: Hash) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let hash: Hash = bytes.try_into().ok()?;
        Some(Self(hash))
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn normalize_marker(marker: &str) -> String {
    marker.split_whitespace().collect::<Vec<_>>().join(" ")
}
