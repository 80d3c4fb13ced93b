use std::backtrace::Backtrace;
use std::fs::File;
use std::io::Read;

use crate::model::error::transfer_errors::{DownloadError, UploadError};
use crate::model::repository::EntryKind;
use crate::repository::{entry_repository, open_connection, user_repository};
use crate::service::path_service::split_path;
use crate::service::storage_service;
use crate::service::storage_service::StoreBlobError;
use crate::service::transfer_service::copy_exact;

/// receives exactly `length` bytes from `body` into the blob derived from
/// the logical path, then commits the metadata entry and the ledger update.
/// A short or failed transfer leaves neither a blob nor an entry behind
pub fn upload_file(
    login: &str,
    path: &str,
    length: u64,
    body: &mut impl Read,
) -> Result<(), UploadError> {
    let (parent, name) = split_path(path);
    if name.is_empty() {
        return Err(UploadError::MissingName);
    }
    let physical = storage_service::physical_name(name, EntryKind::File);
    let blob = match storage_service::blob_path(login, &physical) {
        Some(p) => p,
        None => {
            // server-generated, so this is an integrity fault, not bad input
            log::error!(
                "derived blob path for {login} escaped the storage root\n{}",
                Backtrace::force_capture()
            );
            // the client was already cleared to send; drain the announced
            // body so the line protocol stays in sync
            copy_exact(body, &mut std::io::sink(), length).unwrap_or(0);
            return Err(UploadError::UnsafePath);
        }
    };
    match storage_service::store_blob(&blob, body, length) {
        Ok(_) => {}
        Err(StoreBlobError::IncompleteTransfer) => return Err(UploadError::IncompleteTransfer),
        Err(StoreBlobError::FileSystemFailure) => return Err(UploadError::FileSystemFailure),
    }
    let mut con = open_connection();
    let committed = commit_upload(login, parent, name, &physical, path, length, &mut con);
    con.close().unwrap();
    committed.map_err(|e| {
        log::error!("Stored blob but failed to commit metadata: {e:?}");
        UploadError::DbFailure
    })
}

/// the entry, the ledger movement, and the ancestor timestamps land
/// together or not at all
fn commit_upload(
    login: &str,
    parent: &str,
    name: &str,
    physical: &str,
    path: &str,
    length: u64,
    con: &mut rusqlite::Connection,
) -> Result<(), rusqlite::Error> {
    let tx = con.transaction()?;
    entry_repository::add_entry(login, parent, name, physical, EntryKind::File, &tx)?;
    user_repository::record_upload(login, length, &tx)?;
    entry_repository::touch_ancestors(login, path, &tx)?;
    tx.commit()
}

/// looks up a file entry and opens its blob for streaming. Folder entries
/// and unknown paths both come back as NotFound; an entry whose blob is
/// gone from disk is reported separately
pub fn download_file(login: &str, path: &str) -> Result<(u64, File), DownloadError> {
    let (parent, name) = split_path(path);
    let con = open_connection();
    let entry = entry_repository::get_entry(login, parent, name, &con);
    con.close().unwrap();
    let physical = match entry {
        Ok((physical, EntryKind::File)) => physical,
        Ok((_, EntryKind::Folder)) | Err(rusqlite::Error::QueryReturnedNoRows) => {
            return Err(DownloadError::NotFound)
        }
        Err(e) => {
            log::error!("Failed to look up file entry. Nested exception is {e:?}");
            return Err(DownloadError::DbFailure);
        }
    };
    let blob = match storage_service::blob_path(login, &physical) {
        Some(p) => p,
        None => {
            log::error!(
                "physical name {physical} for {login} escaped the storage root\n{}",
                Backtrace::force_capture()
            );
            return Err(DownloadError::UnsafePath);
        }
    };
    storage_service::fetch_blob(&blob).map_err(|_| DownloadError::MissingBlob)
}
