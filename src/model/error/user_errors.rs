#[derive(PartialEq, Debug)]
pub enum RegisterError {
    /// a user with the same login already exists
    DuplicateLogin,
    /// the login contains path separators or is a relative path component,
    /// which would escape the per-user storage layout
    InvalidLogin,
    DbFailure,
}

#[derive(PartialEq, Debug)]
pub enum AuthenticateError {
    /// login unknown or password hash mismatch
    BadCredentials,
    /// credentials matched but the salt row could not be read
    MissingSalt,
    /// the user's storage directory could not be created
    FileSystemFailure,
    DbFailure,
}

#[derive(PartialEq, Debug)]
pub enum GetStatsError {
    NotFound,
    DbFailure,
}
