use std::path::Path;
use std::time::Duration;

#[cfg(not(test))]
use rusqlite::OpenFlags;
use rusqlite::{Connection, Result};

use crate::db_migrations::migrate_db;

pub mod entry_repository;
pub mod user_repository;

/// creates a new connection and returns it, but panics if the connection could not be created
#[cfg(not(test))]
pub fn open_connection() -> Connection {
    use crate::config::VAULT_SERVER_CONFIG;

    let con = match Connection::open_with_flags(
        Path::new(VAULT_SERVER_CONFIG.clone().database.location.as_str()),
        OpenFlags::default(),
    ) {
        Ok(con) => con,
        Err(error) => panic!("Failed to get a connection to the database!: {error}"),
    };
    set_busy_timeout(&con);
    con
}

#[cfg(test)]
pub fn open_connection() -> Connection {
    let db_name = format!("{}.sqlite", crate::test::current_thread_name());
    let con =
        match Connection::open_with_flags(Path::new(db_name.as_str()), rusqlite::OpenFlags::default()) {
            Ok(con) => con,
            Err(error) => panic!("Failed to get a connection to the database!: {error}"),
        };
    set_busy_timeout(&con);
    con
}

/// concurrent sessions share the database file; writers wait on each other
/// instead of surfacing SQLITE_BUSY to command handlers
fn set_busy_timeout(con: &Connection) {
    con.busy_timeout(Duration::from_secs(5))
        .unwrap_or_else(|e| panic!("Failed to set database busy timeout: {e}"));
}

/// runs init.sql on the database
fn create_db(con: &mut Connection) {
    let sql = include_str!("../assets/init.sql");
    con.execute_batch(sql).unwrap();
}

/// returns the current version of the database as a String
fn get_version(con: &Connection) -> Result<String> {
    con.query_row(
        include_str!("../assets/queries/metadata/get_database_version.sql"),
        [],
        |row| row.get(0),
    )
}

/// handles checking if the database exists and is up to the correct version.
/// If not, it either creates or upgrades the database accordingly
pub fn initialize_db() -> Result<()> {
    let mut con = open_connection();
    let table_version = match get_version(&con) {
        Ok(value) => value.parse::<u64>().unwrap(),
        Err(_) => {
            // tables haven't been created yet
            create_db(&mut con);
            1
        }
    };
    migrate_db(&con, table_version)?;
    con.close().unwrap();
    Ok(())
}
