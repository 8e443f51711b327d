use std::io::Read;
use std::path::Path;

use ipshield_types::Fingerprint;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Default read chunk for streamed hashing.
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// SHA-256 content hasher producing [`Fingerprint`]s.
///
/// Fingerprints are plain SHA-256 digests of the file bytes (no domain tag),
/// so anyone can recompute them with standard tooling such as `sha256sum`.
/// Large inputs should go through [`hash_reader`](Self::hash_reader),
/// [`hash_async_reader`](Self::hash_async_reader) or
/// [`hash_file`](Self::hash_file), which read in fixed-size chunks instead
/// of loading the whole file.
#[derive(Clone, Copy, Debug)]
pub struct ContentHasher {
    chunk_size: usize,
}

impl ContentHasher {
    pub const fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Use a custom read chunk size (minimum 1 byte).
    pub const fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: if chunk_size == 0 { 1 } else { chunk_size },
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Hash an in-memory blob.
    pub fn hash(&self, data: &[u8]) -> Fingerprint {
        let mut hasher = StreamingHasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Hash everything a blocking reader yields.
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> Result<Fingerprint, HasherError> {
        let mut hasher = StreamingHasher::new();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HasherError::Io(e)),
            };
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize())
    }

    /// Hash everything an async reader yields.
    pub async fn hash_async_reader<R>(&self, mut reader: R) -> Result<Fingerprint, HasherError>
    where
        R: AsyncRead + Unpin,
    {
        let mut hasher = StreamingHasher::new();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize())
    }

    /// Stream a file from disk.
    pub async fn hash_file(&self, path: impl AsRef<Path>) -> Result<Fingerprint, HasherError> {
        let file = tokio::fs::File::open(path.as_ref()).await?;
        self.hash_async_reader(file).await
    }

    /// Verify that data produces the expected fingerprint.
    pub fn verify(&self, data: &[u8], expected: &Fingerprint) -> bool {
        self.hash(data) == *expected
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Incremental SHA-256 state for callers that feed chunks themselves.
#[derive(Clone, Default)]
pub struct StreamingHasher {
    inner: Sha256,
    bytes: u64,
}

impl StreamingHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Total bytes fed so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    pub fn finalize(self) -> Fingerprint {
        Fingerprint::from_digest(self.inner.finalize().into())
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error)]
pub enum HasherError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
