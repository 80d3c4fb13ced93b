use std::fs;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::model::repository::EntryKind;
use crate::service::path_service::safe_path;
use crate::service::transfer_service::copy_exact;

/// the root under which every user's blob directory lives
#[cfg(not(test))]
pub fn storage_dir() -> String {
    use crate::config::VAULT_SERVER_CONFIG;
    VAULT_SERVER_CONFIG.clone().storage.location
}

#[cfg(test)]
pub fn storage_dir() -> String {
    format!("./{}_storage", crate::test::current_thread_name())
}

pub fn user_dir(login: &str) -> String {
    format!("{}/{login}", storage_dir())
}

/// ensures the shared storage root exists; called once at startup
pub fn check_storage_dir() {
    let dir = storage_dir();
    let path = Path::new(dir.as_str());
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path) {
            panic!("Failed to create storage directory: \n {:?}", e);
        }
    }
}

/// creates the user's blob directory if it's missing; happens on AUTH so a
/// fresh user can upload immediately
pub fn ensure_user_dir(login: &str) -> std::io::Result<()> {
    fs::create_dir_all(user_dir(login))
}

/// derives the on-disk blob name from the client-encrypted logical name.
/// Deliberately hashes the leaf name only, so equal names in different
/// folders share a blob name; logical uniqueness lives in the entries table
pub fn physical_name(logical_name: &str, kind: EntryKind) -> String {
    let mut hasher = Sha256::new();
    hasher.update(logical_name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    match kind {
        EntryKind::File => digest,
        EntryKind::Folder => format!("{digest}_folder"),
    }
}

/// resolves a physical name inside the user's root, or `None` when the
/// resolution escapes it
pub fn blob_path(login: &str, physical: &str) -> Option<PathBuf> {
    safe_path(user_dir(login).as_str(), physical)
}

#[derive(PartialEq, Debug)]
pub enum StoreBlobError {
    /// fewer bytes arrived than announced; the partial blob has been removed
    IncompleteTransfer,
    FileSystemFailure,
}

/// streams exactly `expected` bytes from `body` into a new blob. A short or
/// failed transfer removes whatever was written so no partial blob survives
pub fn store_blob(
    path: &Path,
    body: &mut impl Read,
    expected: u64,
) -> Result<u64, StoreBlobError> {
    let mut file = match File::create(path) {
        Ok(f) => f,
        Err(e) => {
            log::error!("Failed to create blob at {path:?}: {e:?}");
            return Err(StoreBlobError::FileSystemFailure);
        }
    };
    match copy_exact(body, &mut file, expected) {
        Ok(written) if written == expected => Ok(written),
        Ok(written) => {
            log::warn!("blob at {path:?} got {written} of {expected} bytes; removing partial file");
            drop(file);
            fs::remove_file(path).unwrap_or(());
            Err(StoreBlobError::IncompleteTransfer)
        }
        Err(e) => {
            log::error!("Failed writing blob at {path:?}: {e:?}");
            drop(file);
            fs::remove_file(path).unwrap_or(());
            Err(StoreBlobError::FileSystemFailure)
        }
    }
}

/// opens a blob for streaming back to a client, along with its length
pub fn fetch_blob(path: &Path) -> std::io::Result<(u64, File)> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    Ok((len, file))
}

/// removes a blob; a blob that's already gone is a success
pub fn delete_blob(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{cleanup, create_user_storage};
    use std::io::Cursor;

    #[test]
    fn physical_name_is_deterministic_and_kind_tagged() {
        let file = physical_name("token", EntryKind::File);
        let folder = physical_name("token", EntryKind::Folder);
        assert_eq!(file, physical_name("token", EntryKind::File));
        assert_eq!(format!("{file}_folder"), folder);
        assert_ne!(file, physical_name("other", EntryKind::File));
    }

    #[test]
    fn store_blob_keeps_complete_transfers() {
        create_user_storage("bob");
        let path = blob_path("bob", "blob_a").unwrap();
        let body = vec![7u8; 5000];
        let written = store_blob(&path, &mut Cursor::new(&body), 5000).unwrap();
        assert_eq!(5000, written);
        assert_eq!(body, fs::read(&path).unwrap());
        cleanup();
    }

    #[test]
    fn store_blob_removes_partial_transfers() {
        create_user_storage("bob");
        let path = blob_path("bob", "blob_b").unwrap();
        // announce 5000 but only provide 1200
        let body = vec![7u8; 1200];
        let res = store_blob(&path, &mut Cursor::new(&body), 5000);
        assert_eq!(Err(StoreBlobError::IncompleteTransfer), res);
        assert!(!path.exists());
        cleanup();
    }

    #[test]
    fn delete_blob_is_idempotent() {
        create_user_storage("bob");
        let path = blob_path("bob", "blob_c").unwrap();
        fs::write(&path, b"x").unwrap();
        delete_blob(&path).unwrap();
        delete_blob(&path).unwrap();
        assert!(!path.exists());
        cleanup();
    }
}
