use std::backtrace::Backtrace;
use std::time::UNIX_EPOCH;

use crate::model::error::entry_errors::{CreateFolderError, DeleteError};
use crate::model::repository::EntryKind;
use crate::model::response::ListEntry;
use crate::repository::{entry_repository, open_connection};
use crate::service::path_service::split_path;
use crate::service::storage_service;

/// creates a folder entry at the given normalized logical path. Creating a
/// folder that already exists is a no-op, not an error
pub fn create_folder(login: &str, path: &str) -> Result<(), CreateFolderError> {
    let (parent, name) = split_path(path);
    if name.is_empty() {
        return Err(CreateFolderError::MissingName);
    }
    let physical = storage_service::physical_name(name, EntryKind::Folder);
    let con = open_connection();
    let result = entry_repository::add_entry(login, parent, name, &physical, EntryKind::Folder, &con)
        .and_then(|_| entry_repository::touch_ancestors(login, path, &con));
    con.close().unwrap();
    result.map_err(|e| {
        log::error!("Failed to create folder. Nested exception is {e:?}");
        CreateFolderError::DbFailure
    })
}

/// lists the direct children of a folder path. Listing never fails in-band:
/// an unknown path yields an empty list, and a missing blob falls back to
/// the entry's stored timestamp with size 0
pub fn list_folder(login: &str, path: &str) -> Vec<ListEntry> {
    let con = open_connection();
    let children = entry_repository::get_child_entries(login, path, &con);
    con.close().unwrap();
    let children = match children {
        Ok(c) => c,
        Err(e) => {
            log::error!("Failed to list {path} for {login}. Nested exception is {e:?}");
            return Vec::new();
        }
    };
    children
        .into_iter()
        .map(|entry| {
            let mut size = 0;
            let mut date = entry.modified_date;
            if entry.kind == EntryKind::File {
                if let Some(blob) = storage_service::blob_path(login, &entry.physical_name) {
                    if let Ok(meta) = blob.metadata() {
                        size = meta.len();
                        if let Ok(mtime) = meta.modified() {
                            if let Ok(elapsed) = mtime.duration_since(UNIX_EPOCH) {
                                date = elapsed.as_secs();
                            }
                        }
                    }
                }
            }
            let item_type = match entry.kind {
                EntryKind::File => "file",
                EntryKind::Folder => "folder",
            };
            ListEntry {
                name: entry.logical_name,
                size,
                date,
                item_type: item_type.to_string(),
            }
        })
        .collect()
}

/// refreshes the ancestor timestamps of a path that changed through some
/// other route, like a zip extraction
pub fn touch_path_ancestors(login: &str, path: &str) {
    let con = open_connection();
    let result = entry_repository::touch_ancestors(login, path, &con);
    con.close().unwrap();
    if let Err(e) = result {
        log::error!("Failed to touch ancestors of {path}. Nested exception is {e:?}");
    }
}

/// removes a file or a whole folder subtree: blobs first, then every
/// metadata row in one transaction, then the ancestor timestamps
pub fn delete_item(login: &str, path: &str) -> Result<(), DeleteError> {
    let con = open_connection();
    let resolved = entry_repository::resolve_deletion_set(login, path, &con);
    con.close().unwrap();
    let (_, physical_names) = match resolved {
        Ok(set) => set,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Err(DeleteError::NotFound),
        Err(e) => {
            log::error!("Failed to resolve deletion set. Nested exception is {e:?}");
            return Err(DeleteError::DbFailure);
        }
    };
    for physical in &physical_names {
        let blob = match storage_service::blob_path(login, physical) {
            Some(p) => p,
            None => {
                // server-generated names should never escape the user root
                log::error!(
                    "physical name {physical} for {login} escaped the storage root\n{}",
                    Backtrace::force_capture()
                );
                continue;
            }
        };
        if let Err(e) = storage_service::delete_blob(&blob) {
            log::error!("Failed to delete blob {blob:?}. Nested exception is {e:?}");
            return Err(DeleteError::FileSystemFailure);
        }
    }
    let mut con = open_connection();
    let deleted = entry_repository::delete_subtree(login, path, &mut con)
        .and_then(|_| entry_repository::touch_ancestors(login, path, &con));
    con.close().unwrap();
    deleted.map_err(|e| {
        log::error!("Failed to delete metadata subtree. Nested exception is {e:?}");
        DeleteError::DbFailure
    })
}
