use std::io;
use std::path::Path;

use hmac_sha256::Hash;
use tokio::fs;
use tokio::io::AsyncReadExt;

use super::Digest;

const READ_BUF_SIZE: usize = 64 * 1024;

impl Digest {
    /// Computes the digest of an in-memory buffer.
    pub fn of_bytes(input: &[u8]) -> Digest {
        Digest(hex::encode(Hash::hash(input)))
    }

    /// Checks whether this digest matches the given bytes.
    pub fn verify(&self, input: &[u8]) -> bool {
        Digest::of_bytes(input) == *self
    }
}

/// Computes the digest of a file by streaming its contents through the
/// hasher in fixed-size chunks. The file is never loaded whole.
pub async fn digest_file(path: &Path) -> io::Result<Digest> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Hash::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(Digest(hex::encode(hasher.finalize())))
}

/// Recomputes a file's digest and compares it, case-sensitively, against
/// the expected one. Run at every upload finalize.
pub async fn verify_file(path: &Path, expected: &Digest) -> io::Result<bool> {
    Ok(digest_file(path).await? == *expected)
}
