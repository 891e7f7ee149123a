use std::fs::File;
use std::io::Read;
use std::path::Path;

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::transfer::TransferError;

/// Read block size for checksum calculation: 8 KiB.
pub const CHECKSUM_BLOCK_SIZE: usize = 8 * 1024;

/// Hex-encoded digests of a file's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksums {
    pub md5: String,
    pub sha256: String,
}

/// Compute MD5 and SHA-256 of a file in a single streaming pass.
///
/// The file is read in [`CHECKSUM_BLOCK_SIZE`] blocks so memory use does not
/// depend on file size. A read failure part way through returns an error and
/// no digest.
pub fn calculate_checksums(path: &Path) -> Result<Checksums, TransferError> {
    let mut file = File::open(path).map_err(|e| TransferError::io(path, e))?;
    let mut md5 = Md5::new();
    let mut sha256 = Sha256::new();
    let mut buffer = [0u8; CHECKSUM_BLOCK_SIZE];
    loop {
        let read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransferError::io(path, e)),
        };
        md5.update(&buffer[..read]);
        sha256.update(&buffer[..read]);
    }

    Ok(Checksums {
        md5: hex::encode(md5.finalize()),
        sha256: hex::encode(sha256.finalize()),
    })
}
