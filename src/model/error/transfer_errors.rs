#[derive(PartialEq, Debug)]
pub enum UploadError {
    /// an empty logical path was passed
    MissingName,
    /// fewer bytes arrived than the client announced; the partial blob is gone
    IncompleteTransfer,
    /// the derived physical path escaped the user root; server-side integrity fault
    UnsafePath,
    FileSystemFailure,
    DbFailure,
}

#[derive(PartialEq, Debug)]
pub enum DownloadError {
    /// no file entry at the requested logical path
    NotFound,
    /// metadata says the file exists but the blob is gone from disk
    MissingBlob,
    UnsafePath,
    DbFailure,
}

#[derive(PartialEq, Debug)]
pub enum PackZipError {
    /// no folder entry at the requested logical path
    NotFound,
    /// the folder holds no files and no subfolders
    EmptyFolder,
    ZipFailure,
    DbFailure,
}

#[derive(PartialEq, Debug)]
pub enum ExtractZipError {
    /// the uploaded bytes are not a readable zip archive
    BadArchive,
    UnsafePath,
    FileSystemFailure,
    DbFailure,
}
