use std::fs::{self, File, FileTimes, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use crate::transfer::TransferError;
use crate::transfer::checksum::Checksums;
use crate::transfer::metadata::FileRecord;
use crate::transfer::progress::ProgressSink;
use crate::transfer::types::{OperationKind, TransferTask};
use crate::transfer::verify::verify_file_integrity;

/// Block size for file transfers: 1 MiB.
pub const TRANSFER_CHUNK_SIZE: usize = 1024 * 1024;

/// Copy `source` to `destination` one block at a time.
///
/// Parent directories of the destination are created as needed and the sink
/// is advanced after every written block. A failed write leaves the partial
/// destination in place. A destination that is the source itself is refused
/// before anything is opened for writing. Returns the number of bytes copied.
pub fn copy_file_chunked(source: &Path, destination: &Path, progress: &dyn ProgressSink) -> Result<u64, TransferError> {
    let mut reader = match File::open(source) {
        Ok(file) => file,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            return Err(TransferError::NotFound(source.to_path_buf()));
        }
        Err(error) => return Err(TransferError::io(source, error)),
    };

    if is_same_file(source, destination) {
        return Err(TransferError::SameFile(destination.to_path_buf()));
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| TransferError::io(parent, e))?;
    }

    let mut writer = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(destination)
        .map_err(|e| TransferError::io(destination, e))?;

    let mut buffer = vec![0u8; TRANSFER_CHUNK_SIZE];
    let mut bytes_copied: u64 = 0;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => return Err(TransferError::io(source, error)),
        };
        writer
            .write_all(&buffer[..read])
            .map_err(|e| TransferError::io(destination, e))?;
        bytes_copied += read as u64;
        progress.advance(read as u64);
    }
    writer.flush().map_err(|e| TransferError::io(destination, e))?;
    drop(writer);

    preserve_attributes(source, destination);
    Ok(bytes_copied)
}

/// True when both paths exist and refer to the same file on disk.
fn is_same_file(source: &Path, destination: &Path) -> bool {
    let (Ok(source_metadata), Ok(destination_metadata)) = (fs::metadata(source), fs::metadata(destination)) else {
        return false;
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        source_metadata.dev() == destination_metadata.dev() && source_metadata.ino() == destination_metadata.ino()
    }
    #[cfg(not(unix))]
    {
        let _ = (source_metadata, destination_metadata);
        matches!(
            (dunce::canonicalize(source), dunce::canonicalize(destination)),
            (Ok(source), Ok(destination)) if source == destination
        )
    }
}

/// Copy modification time and permissions from source to destination.
///
/// Best effort: failures are ignored since the file content is already in place.
fn preserve_attributes(source: &Path, destination: &Path) {
    let Ok(metadata) = fs::metadata(source) else {
        return;
    };

    let mut times = FileTimes::new();
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(file) = OpenOptions::new().write(true).open(destination) {
        let _ = file.set_times(times);
    }

    let _ = fs::set_permissions(destination, metadata.permissions());
}

/// Run one transfer task to completion.
///
/// Copy leaves the source untouched. Move deletes the source only after the
/// destination has been confirmed identical to it by size and checksum, or
/// straight away when `verify_integrity` is off. On a failed verification
/// the source is kept and [`TransferError::Integrity`] is returned.
pub fn transfer_file(
    task: &TransferTask,
    verify_integrity: bool,
    progress: &dyn ProgressSink,
) -> Result<FileRecord, TransferError> {
    if !task.source.is_file() {
        return Err(TransferError::NotFound(task.source.clone()));
    }

    copy_file_chunked(&task.source, &task.destination, progress)?;

    match task.operation {
        OperationKind::Copy => FileRecord::from_path(&task.file_name, &task.destination, verify_integrity),
        OperationKind::Move => {
            let record = if verify_integrity {
                let source_record = FileRecord::from_path(&task.file_name, &task.source, true)?;
                let verification = verify_file_integrity(&task.destination, &source_record)?;
                if !verification.is_verified() {
                    return Err(TransferError::Integrity {
                        path: task.destination.clone(),
                        mismatch: verification,
                    });
                }
                let checksums = source_record
                    .md5
                    .zip(source_record.sha256)
                    .map(|(md5, sha256)| Checksums { md5, sha256 });
                FileRecord::with_checksums(&task.file_name, &task.destination, checksums)?
            } else {
                FileRecord::from_path(&task.file_name, &task.destination, false)?
            };

            fs::remove_file(&task.source).map_err(|e| TransferError::io(&task.source, e))?;
            Ok(record)
        }
    }
}
