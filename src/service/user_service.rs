use rand::RngCore;
use rusqlite::ErrorCode;
use sha2::{Digest, Sha256};

use crate::model::error::user_errors::{AuthenticateError, GetStatsError, RegisterError};
use crate::model::repository::UserStats;
use crate::repository::{open_connection, user_repository};
use crate::service::storage_service;

/// the login names the user's directory under the storage root, so it must
/// be a single plain path component
fn valid_login(login: &str) -> bool {
    !login.is_empty()
        && login != "."
        && login != ".."
        && !login.contains('/')
        && !login.contains('\\')
}

/// creates a user with a fresh 16-byte salt. The salt feeds the client's
/// key derivation and is never used server-side beyond storage
pub fn register(login: &str, password: &str) -> Result<(), RegisterError> {
    if !valid_login(login) {
        return Err(RegisterError::InvalidLogin);
    }
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let con = open_connection();
    let result = user_repository::create_user(login, &hash_password(password), &salt, &con);
    con.close().unwrap();
    match result {
        Ok(()) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == ErrorCode::ConstraintViolation =>
        {
            Err(RegisterError::DuplicateLogin)
        }
        Err(e) => {
            log::error!("Failed to register user. Nested exception is {e:?}");
            Err(RegisterError::DbFailure)
        }
    }
}

/// checks credentials and, on success, makes sure the user's blob directory
/// exists and returns the hex salt the client needs for key derivation
pub fn authenticate(login: &str, password: &str) -> Result<String, AuthenticateError> {
    if !valid_login(login) {
        return Err(AuthenticateError::BadCredentials);
    }
    let con = open_connection();
    let matched = user_repository::check_credentials(login, &hash_password(password), &con);
    let matched = match matched {
        Ok(m) => m,
        Err(e) => {
            con.close().unwrap();
            log::error!("Failed to check credentials. Nested exception is {e:?}");
            return Err(AuthenticateError::DbFailure);
        }
    };
    if !matched {
        con.close().unwrap();
        return Err(AuthenticateError::BadCredentials);
    }
    let salt = user_repository::get_user_salt(login, &con);
    con.close().unwrap();
    let salt = match salt {
        Ok(s) => s,
        Err(e) => {
            log::error!("Credentials matched but salt lookup failed: {e:?}");
            return Err(AuthenticateError::MissingSalt);
        }
    };
    if let Err(e) = storage_service::ensure_user_dir(login) {
        log::error!("Failed to create storage directory for {login}: {e:?}");
        return Err(AuthenticateError::FileSystemFailure);
    }
    Ok(to_hex(&salt))
}

pub fn get_stats(login: &str) -> Result<UserStats, GetStatsError> {
    let con = open_connection();
    let result = user_repository::get_user_stats(login, &con);
    con.close().unwrap();
    match result {
        Ok(stats) => Ok(stats),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(GetStatsError::NotFound),
        Err(e) => {
            log::error!("Failed to read user stats. Nested exception is {e:?}");
            Err(GetStatsError::DbFailure)
        }
    }
}

/// ledger update for a finished zip upload; single-file uploads record
/// inside the upload path so the count stays tied to the metadata commit
pub fn record_upload(login: &str, bytes: u64) {
    let con = open_connection();
    let result = user_repository::record_upload(login, bytes, &con);
    con.close().unwrap();
    if let Err(e) = result {
        log::error!("Failed to record upload of {bytes} bytes for {login}: {e:?}");
    }
}

/// ledger update for a finished download, called once the last body byte
/// has been written to the peer
pub fn record_download(login: &str, bytes: u64) {
    let con = open_connection();
    let result = user_repository::record_download(login, bytes, &con);
    con.close().unwrap();
    if let Err(e) = result {
        log::error!("Failed to record download of {bytes} bytes for {login}: {e:?}");
    }
}

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{cleanup, refresh_db};

    #[test]
    fn register_then_authenticate_returns_salt_hex() {
        refresh_db();
        register("alice", "pw1").unwrap();
        let salt = authenticate("alice", "pw1").unwrap();
        assert_eq!(32, salt.len());
        assert!(salt.chars().all(|c| c.is_ascii_hexdigit()));
        // same salt every time
        assert_eq!(salt, authenticate("alice", "pw1").unwrap());
        cleanup();
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        refresh_db();
        register("alice", "pw1").unwrap();
        assert_eq!(Err(RegisterError::DuplicateLogin), register("alice", "pw2"));
        cleanup();
    }

    #[test]
    fn bad_credentials_are_rejected() {
        refresh_db();
        register("alice", "pw1").unwrap();
        assert_eq!(
            Err(AuthenticateError::BadCredentials),
            authenticate("alice", "wrong")
        );
        assert_eq!(
            Err(AuthenticateError::BadCredentials),
            authenticate("nobody", "pw1")
        );
        cleanup();
    }

    #[test]
    fn logins_with_path_components_are_rejected() {
        refresh_db();
        for login in ["../escapee", "a/b", "a\\b", "..", ".", ""] {
            assert_eq!(Err(RegisterError::InvalidLogin), register(login, "pw"));
        }
        // a login that was never registered also can't sneak through AUTH
        // and have its directory created outside the storage root
        assert_eq!(
            Err(AuthenticateError::BadCredentials),
            authenticate("../escapee", "pw")
        );
        assert!(!std::path::Path::new("./escapee").exists());
        cleanup();
    }

    #[test]
    fn auth_creates_the_user_storage_dir() {
        refresh_db();
        register("alice", "pw1").unwrap();
        authenticate("alice", "pw1").unwrap();
        assert!(std::path::Path::new(&storage_service::user_dir("alice")).is_dir());
        cleanup();
    }

    #[test]
    fn stats_error_for_unknown_user() {
        refresh_db();
        assert_eq!(Err(GetStatsError::NotFound), get_stats("ghost"));
        cleanup();
    }
}
