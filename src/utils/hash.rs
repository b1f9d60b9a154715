use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

const BUFFER_SIZE: usize = 64 * 1024;

/// Compute the SHA-256 digest of a file by streaming its bytes.
///
/// This always hashes what is on disk, never an in-memory structure, so the
/// digest matches exactly what a later verification will see.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path).context(format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .context(format!("Failed to read {}", path.display()))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Compute the SHA-256 digest of an in-memory byte sequence.
pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_sha256_known_vector() {
        // sha256("abc")
        assert_eq!(
            sha256_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_file_matches_bytes() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"evidence payload").unwrap();
        file.flush().unwrap();

        let from_file = sha256_file(file.path()).unwrap();
        assert_eq!(from_file, sha256_bytes(b"evidence payload"));
    }

    #[test]
    fn test_sha256_file_missing_is_error() {
        assert!(sha256_file(Path::new("/nonexistent/file")).is_err());
    }
}
