#[derive(PartialEq, Debug)]
pub enum CreateFolderError {
    /// an empty logical path was passed
    MissingName,
    DbFailure,
}

#[derive(PartialEq, Debug)]
pub enum DeleteError {
    // no entry at the requested logical path
    NotFound,
    // couldn't remove one of the backing blobs from the disk
    FileSystemFailure,
    DbFailure,
}
