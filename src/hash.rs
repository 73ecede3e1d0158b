//! Identity Hasher
//!
//! 32-bit signed multiplicative rolling hash (`h = h * 31 + x`, wrapping),
//! the same convention the sync server and its desktop plugin use to
//! fingerprint paths and file contents.
//!
//! - Path fingerprints fold Unicode code points of the remote path.
//! - Content fingerprints fold raw byte values (0-255).
//!
//! Empty input yields 0.

use std::fmt;
use std::path::Path;

use serde::{Serialize, Serializer};
use tokio::io::AsyncReadExt;

/// Read buffer used when fingerprinting files
const READ_BUFFER_SIZE: usize = 64 * 1024;

// ============================================================================
// Fingerprint
// ============================================================================

/// A 32-bit signed fingerprint
///
/// Serialized as a decimal string, which is how the server expects
/// `pathHash` and `contentHash` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Fingerprint(pub i32);

impl Fingerprint {
    pub fn value(self) -> i32 {
        self.0
    }

    /// Compare against a fingerprint reported by the server
    pub fn matches(self, reported: &str) -> bool {
        reported.trim().parse::<i32>().map(|v| v == self.0).unwrap_or(false)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[inline]
fn fold(h: i32, x: u32) -> i32 {
    h.wrapping_mul(31).wrapping_add(x as i32)
}

// ============================================================================
// Hashing
// ============================================================================

/// Fingerprint a path string over its code points
pub fn path_fingerprint(path: &str) -> Fingerprint {
    Fingerprint(path.chars().fold(0, |h, c| fold(h, c as u32)))
}

/// Fingerprint raw bytes
pub fn content_fingerprint(data: &[u8]) -> Fingerprint {
    let mut hasher = ContentHasher::new();
    hasher.update(data);
    hasher.finish()
}

/// Incremental content fingerprint, for hashing a file without loading it
#[derive(Debug, Clone, Default)]
pub struct ContentHasher {
    state: i32,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.state = data.iter().fold(self.state, |h, &b| fold(h, b as u32));
    }

    pub fn finish(&self) -> Fingerprint {
        Fingerprint(self.state)
    }
}

/// Fingerprint a file's contents, streaming it from disk
pub async fn fingerprint_file(path: &Path) -> std::io::Result<(Fingerprint, u64)> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut hasher = ContentHasher::new();
    let mut total = 0u64;

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }

    Ok((hasher.finish(), total))
}

// ============================================================================
// Tests
// ============================================================================
