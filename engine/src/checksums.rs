//! Checksum support for verify-after-copy.
//!
//! The engine hashes source bytes while they stream to the destination, then
//! re-reads the destination through its share and compares the two digests.

use std::fmt;
use std::io::{self, Read};

use serde::Deserialize;

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// MD5 (fast, not collision resistant)
    Md5,
    /// SHA-256
    Sha256,
    /// BLAKE3
    Blake3,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "md5"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

/// A computed checksum value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumValue {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl ChecksumValue {
    pub fn new(algorithm: ChecksumAlgorithm, hex: String) -> Self {
        ChecksumValue { algorithm, hex }
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for ChecksumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// Incremental hasher over one of the supported algorithms.
pub enum StreamHasher {
    Md5(md5::Context),
    Sha256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl StreamHasher {
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Md5 => StreamHasher::Md5(md5::Context::new()),
            ChecksumAlgorithm::Sha256 => StreamHasher::Sha256(sha2::Sha256::default()),
            ChecksumAlgorithm::Blake3 => StreamHasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            StreamHasher::Md5(context) => context.consume(data),
            StreamHasher::Sha256(hasher) => {
                use sha2::Digest;
                hasher.update(data);
            }
            StreamHasher::Blake3(hasher) => {
                hasher.update(data);
            }
        }
    }

    pub fn finalize(self) -> ChecksumValue {
        match self {
            StreamHasher::Md5(context) => {
                ChecksumValue::new(ChecksumAlgorithm::Md5, format!("{:x}", context.compute()))
            }
            StreamHasher::Sha256(hasher) => {
                use sha2::Digest;
                ChecksumValue::new(ChecksumAlgorithm::Sha256, format!("{:x}", hasher.finalize()))
            }
            StreamHasher::Blake3(hasher) => ChecksumValue::new(
                ChecksumAlgorithm::Blake3,
                hasher.finalize().to_hex().to_string(),
            ),
        }
    }
}

/// Hash everything a reader yields.
pub fn compute_checksum<R: Read + ?Sized>(
    reader: &mut R,
    algorithm: ChecksumAlgorithm,
) -> io::Result<ChecksumValue> {
    let mut hasher = StreamHasher::new(algorithm);
    let mut buffer = vec![0u8; crate::fs_ops::COPY_BUFFER_SIZE];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(hasher.finalize())
}
