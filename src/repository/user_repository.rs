use rusqlite::{params, Connection};

use crate::model::repository::UserStats;

/// creates a user row with zeroed counters. Fails with a constraint error if
/// the login is already taken
pub fn create_user(
    login: &str,
    password_hash: &str,
    salt: &[u8],
    con: &Connection,
) -> Result<(), rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!("../assets/queries/user/create_user.sql"))
        .unwrap();
    pst.insert(params![login, password_hash, salt])?;
    Ok(())
}

/// checks the login / password-hash pair against the users table
pub fn check_credentials(
    login: &str,
    password_hash: &str,
    con: &Connection,
) -> Result<bool, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!("../assets/queries/user/check_credentials.sql"))
        .unwrap();
    match pst.query_row(params![login, password_hash], |row| row.get::<_, u32>(0)) {
        Ok(_) => Ok(true),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
        Err(e) => Err(e),
    }
}

/// the per-user salt handed back to the client on AUTH so it can derive its
/// content key. Generated once at registration, never changed
pub fn get_user_salt(login: &str, con: &Connection) -> Result<Vec<u8>, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!("../assets/queries/user/get_user_salt.sql"))
        .unwrap();
    pst.query_row(params![login], |row| row.get(0))
}

pub fn record_upload(login: &str, bytes: u64, con: &Connection) -> Result<(), rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!("../assets/queries/user/record_upload.sql"))
        .unwrap();
    pst.execute(params![bytes, login])?;
    Ok(())
}

pub fn record_download(login: &str, bytes: u64, con: &Connection) -> Result<(), rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!("../assets/queries/user/record_download.sql"))
        .unwrap();
    pst.execute(params![bytes, login])?;
    Ok(())
}

pub fn get_user_stats(login: &str, con: &Connection) -> Result<UserStats, rusqlite::Error> {
    let mut pst = con
        .prepare(include_str!("../assets/queries/user/get_user_stats.sql"))
        .unwrap();
    pst.query_row(params![login], |row| {
        Ok(UserStats {
            upload_count: row.get(0)?,
            download_count: row.get(1)?,
            bytes_uploaded: row.get(2)?,
            bytes_downloaded: row.get(3)?,
        })
    })
}
