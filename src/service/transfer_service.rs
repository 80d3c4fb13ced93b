use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::model::error::transfer_errors::{ExtractZipError, PackZipError};
use crate::model::repository::EntryKind;
use crate::repository::{entry_repository, open_connection};
use crate::service::path_service::{normalize_path, split_path};
use crate::service::storage_service;

/// matches the protocol's historical socket buffer size
pub const CHUNK_SIZE: usize = 4096;

/// copies up to `expected` bytes in fixed-size chunks, returning how many
/// actually moved. A short count means the reader hit EOF early
pub fn copy_exact<R, W>(reader: &mut R, writer: &mut W, expected: u64) -> std::io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = [0u8; CHUNK_SIZE];
    let mut copied: u64 = 0;
    while copied < expected {
        let want = std::cmp::min(CHUNK_SIZE as u64, expected - copied) as usize;
        let read = reader.read(&mut buf[..want])?;
        if read == 0 {
            break;
        }
        writer.write_all(&buf[..read])?;
        copied += read as u64;
    }
    Ok(copied)
}

/// copies a reader to a writer until EOF, in protocol-sized chunks
pub fn copy_all<R, W>(reader: &mut R, writer: &mut W) -> std::io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = [0u8; CHUNK_SIZE];
    let mut copied: u64 = 0;
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        writer.write_all(&buf[..read])?;
        copied += read as u64;
    }
    Ok(copied)
}

/// packs a user's folder into an in-memory zip whose entry paths are the
/// logical paths relative to the requested folder. Folders become empty
/// directory records so the hierarchy survives even though blob storage is
/// flat. Returns the archive plus the total size of the packed file content,
/// which is what the usage ledger counts
pub fn pack_folder(login: &str, folder_path: &str) -> Result<(Vec<u8>, u64), PackZipError> {
    let con = open_connection();
    if !folder_path.is_empty() {
        let (parent, name) = split_path(folder_path);
        match entry_repository::get_entry(login, parent, name, &con) {
            Ok((_, EntryKind::Folder)) => {}
            Ok((_, EntryKind::File)) | Err(rusqlite::Error::QueryReturnedNoRows) => {
                con.close().unwrap();
                return Err(PackZipError::NotFound);
            }
            Err(e) => {
                log::error!("Failed to look up folder to pack: {e:?}");
                con.close().unwrap();
                return Err(PackZipError::DbFailure);
            }
        }
    }
    let files = entry_repository::get_files_under(login, folder_path, &con).map_err(|e| {
        log::error!("Failed to collect files for zip: {e:?}");
        PackZipError::DbFailure
    });
    let folders = entry_repository::get_folders_under(login, folder_path, &con).map_err(|e| {
        log::error!("Failed to collect folders for zip: {e:?}");
        PackZipError::DbFailure
    });
    con.close().unwrap();
    let (files, folders) = (files?, folders?);
    if files.is_empty() && folders.is_empty() {
        return Err(PackZipError::EmptyFolder);
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut total_content: u64 = 0;
    for folder in folders {
        let full = join_logical(&folder.parent_path, &folder.logical_name);
        if let Some(relative) = relative_to(&full, folder_path) {
            writer
                .add_directory(relative, options)
                .map_err(|e| {
                    log::error!("Failed to add directory record to zip: {e:?}");
                    PackZipError::ZipFailure
                })?;
        }
    }
    for file in files {
        let full = join_logical(&file.parent_path, &file.logical_name);
        let relative = match relative_to(&full, folder_path) {
            Some(r) => r,
            None => continue,
        };
        let path = match storage_service::blob_path(login, &file.physical_name) {
            Some(p) => p,
            None => continue,
        };
        // a blob missing from disk is skipped, same as in listings
        let (size, mut blob) = match storage_service::fetch_blob(&path) {
            Ok(pair) => pair,
            Err(_) => continue,
        };
        writer.start_file(relative, options).map_err(|e| {
            log::error!("Failed to start zip entry: {e:?}");
            PackZipError::ZipFailure
        })?;
        std::io::copy(&mut blob, &mut writer).map_err(|e| {
            log::error!("Failed to write zip entry: {e:?}");
            PackZipError::ZipFailure
        })?;
        total_content += size;
    }
    let cursor = writer.finish().map_err(|e| {
        log::error!("Failed to finish zip archive: {e:?}");
        PackZipError::ZipFailure
    })?;
    Ok((cursor.into_inner(), total_content))
}

/// registers the destination folder's entry before any zip bytes arrive,
/// mirroring how a plain CREATE_FOLDER would
pub fn ensure_destination_folder(login: &str, dest_path: &str) -> Result<(), ExtractZipError> {
    let (parent, name) = split_path(dest_path);
    let physical = storage_service::physical_name(name, EntryKind::Folder);
    let con = open_connection();
    let res = entry_repository::add_entry(login, parent, name, &physical, EntryKind::Folder, &con);
    con.close().unwrap();
    res.map_err(|e| {
        log::error!("Failed to create destination folder entry: {e:?}");
        ExtractZipError::DbFailure
    })
}

/// walks an uploaded archive and materializes each entry under `dest_path`:
/// directory records become folder entries, file records become blobs plus
/// file entries. Entries already written stay if a later one fails; the
/// caller reports the failure and the ledger is never updated for it
pub fn extract_zip(login: &str, dest_path: &str, bytes: &[u8]) -> Result<(), ExtractZipError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| {
        log::error!("Uploaded bytes are not a readable zip: {e:?}");
        ExtractZipError::BadArchive
    })?;
    let con = open_connection();
    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                log::error!("Failed to read zip entry {index}: {e:?}");
                con.close().unwrap();
                return Err(ExtractZipError::BadArchive);
            }
        };
        let archive_path = normalize_path(entry.name());
        if archive_path.is_empty() {
            // platform metadata entries carry no usable name
            continue;
        }
        let full_logical = format!("{dest_path}/{archive_path}");
        let (parent, name) = split_path(&full_logical);
        if entry.is_dir() {
            let physical = storage_service::physical_name(name, EntryKind::Folder);
            if let Err(e) =
                entry_repository::add_entry(login, parent, name, &physical, EntryKind::Folder, &con)
            {
                log::error!("Failed to record extracted folder: {e:?}");
                con.close().unwrap();
                return Err(ExtractZipError::DbFailure);
            }
        } else {
            let physical = storage_service::physical_name(name, EntryKind::File);
            let path = match storage_service::blob_path(login, &physical) {
                Some(p) => p,
                None => {
                    con.close().unwrap();
                    return Err(ExtractZipError::UnsafePath);
                }
            };
            let mut blob = match std::fs::File::create(&path) {
                Ok(f) => f,
                Err(e) => {
                    log::error!("Failed to create extracted blob at {path:?}: {e:?}");
                    con.close().unwrap();
                    return Err(ExtractZipError::FileSystemFailure);
                }
            };
            if let Err(e) = std::io::copy(&mut entry, &mut blob) {
                log::error!("Failed to write extracted blob at {path:?}: {e:?}");
                con.close().unwrap();
                return Err(ExtractZipError::FileSystemFailure);
            }
            if let Err(e) =
                entry_repository::add_entry(login, parent, name, &physical, EntryKind::File, &con)
            {
                log::error!("Failed to record extracted file: {e:?}");
                con.close().unwrap();
                return Err(ExtractZipError::DbFailure);
            }
        }
    }
    con.close().unwrap();
    Ok(())
}

fn join_logical(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// the archive-internal path for a logical path under the packed root;
/// `None` for the root folder itself
fn relative_to<'a>(full: &'a str, root: &str) -> Option<&'a str> {
    if root.is_empty() {
        return Some(full);
    }
    if full == root {
        return None;
    }
    full.strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
}
